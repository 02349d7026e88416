use crate::{
    clock::{checked_add_days, SimClock},
    config::CustomerConfig,
    error::{SimError, SimResult},
    name_generator::NameGenerator,
    rng::StreamRng,
    types::{Channel, EntityId},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: EntityId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub acquisition_channel: Channel,
    pub created_at: NaiveDateTime,
    pub last_active_at: NaiveDateTime,
    pub city: String,
    pub region: String,
}

impl Customer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        customer_id: EntityId,
        email: String,
        first_name: String,
        last_name: String,
        acquisition_channel: Channel,
        created_at: NaiveDateTime,
        last_active_at: NaiveDateTime,
        city: String,
        region: String,
    ) -> SimResult<Self> {
        if last_active_at < created_at {
            return Err(SimError::invalid_record(
                "customer",
                format!("#{customer_id} last active {last_active_at} before signup {created_at}"),
            ));
        }
        Ok(Self {
            customer_id,
            email,
            first_name,
            last_name,
            acquisition_channel,
            created_at,
            last_active_at,
            city,
            region,
        })
    }
}

/// Draw `count` customers. Ids run 1..=count in generation order.
pub fn generate_customers(
    count: usize,
    config: &CustomerConfig,
    clock: &SimClock,
    rng: &mut StreamRng,
) -> SimResult<Vec<Customer>> {
    if count == 0 {
        return Err(SimError::InvalidArgument("customer count must be positive".into()));
    }
    if config.signup_window_days == 0 || config.channel_weights.is_empty() {
        return Err(SimError::InvalidArgument(
            "customer config needs a signup window and at least one channel".into(),
        ));
    }

    let mut customers = Vec::with_capacity(count);
    for i in 0..count {
        let customer_id = i as EntityId + 1;

        let days_ago = rng.range_inclusive(1, config.signup_window_days);
        let created_at = clock.checked_days_before(days_ago)?;
        // Whole days between signup and as_of, both ends allowed.
        let active_after = rng.range_inclusive(0, days_ago);
        let last_active_at = checked_add_days(created_at, active_after)?;

        let channel = *rng.pick_weighted(&config.channel_weights);
        let (city, region) = NameGenerator::generate_location(rng);
        let first = NameGenerator::generate_first_name(rng);
        let last = NameGenerator::generate_last_name(rng);

        customers.push(Customer::new(
            customer_id,
            NameGenerator::email_for(first, last, customer_id),
            first.to_string(),
            last.to_string(),
            channel,
            created_at,
            last_active_at,
            city.to_string(),
            region.to_string(),
        )?);
    }

    log::info!("{}: generated {} customers", rng.name, customers.len());
    Ok(customers)
}
