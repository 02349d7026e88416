//! Behavioural funnel simulator.
//!
//! Each session walks a small state machine:
//!
//!   Started → Browsed → Carted → CheckoutStarted → Abandoned | Completed
//!
//! Any stage after Browsed may be the last one. Only the two checkout
//! outcomes leave a marker event; a session that stops earlier simply
//! has no later events.
//!
//! RULES:
//!   - Events of one session are emitted in (timestamp, stage) order.
//!   - An order exists iff its session reached Completed.
//!   - Unit prices are the catalog price at generation time.

use crate::{
    catalog::Product,
    clock::{checked_add_secs, SimClock},
    config::{FunnelConfig, PricingConfig},
    customer::Customer,
    error::{SimError, SimResult},
    order::{Order, OrderHeader, OrderItem},
    rng::StreamRng,
    types::{Channel, Device, EntityId, EventKind, Label, OrderStatus, PaymentMethod},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Delivered is three times as likely as any other status.
const STATUS_WEIGHTS: &[(OrderStatus, f64)] = &[
    (OrderStatus::Delivered, 3.0),
    (OrderStatus::Shipped, 1.0),
    (OrderStatus::Processing, 1.0),
    (OrderStatus::Pending, 1.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    Started,
    Browsed,
    Carted,
    CheckoutStarted,
    Abandoned,
    Completed,
}

impl SessionStage {
    pub fn can_advance_to(self, next: SessionStage) -> bool {
        use SessionStage::*;
        matches!(
            (self, next),
            (Started, Browsed)
                | (Browsed, Carted)
                | (Carted, CheckoutStarted)
                | (CheckoutStarted, Abandoned)
                | (CheckoutStarted, Completed)
        )
    }

    pub fn advance(self, next: SessionStage) -> SimResult<SessionStage> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(SimError::integrity("session", format!("illegal transition {self:?} -> {next:?}")))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub customer_id: EntityId,
    pub started_at: NaiveDateTime,
    pub channel: Channel,
    pub device: Device,
}

impl Session {
    pub fn id_for(customer_id: EntityId, seq: u64, started_at: NaiveDateTime) -> String {
        format!("s_{customer_id}_{seq}_{}", started_at.and_utc().timestamp())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EntityId,
    pub customer_id: EntityId,
    pub session_id: String,
    pub kind: EventKind,
    pub product_id: Option<EntityId>,
    pub channel: Channel,
    pub device: Device,
    pub page_url: String,
    pub time_on_page: Option<u32>,
    pub timestamp: NaiveDateTime,
}

impl Event {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: EntityId,
        session: &Session,
        kind: EventKind,
        product_id: Option<EntityId>,
        page_url: String,
        time_on_page: Option<u32>,
        timestamp: NaiveDateTime,
    ) -> SimResult<Self> {
        if kind.carries_product() != product_id.is_some() {
            return Err(SimError::invalid_record(
                "event",
                format!("#{event_id} {} with product {product_id:?}", kind.as_str()),
            ));
        }
        if time_on_page.is_some() && kind != EventKind::ProductView {
            return Err(SimError::invalid_record(
                "event",
                format!("#{event_id} {} carries time on page", kind.as_str()),
            ));
        }
        Ok(Self {
            event_id,
            customer_id: session.customer_id,
            session_id: session.session_id.clone(),
            kind,
            product_id,
            channel: session.channel,
            device: session.device,
            page_url,
            time_on_page,
            timestamp,
        })
    }
}

/// How sessions ended, by last stage reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTally {
    pub sessions: u64,
    pub ended_after_browse: u64,
    pub ended_after_cart: u64,
    pub checkout_abandoned: u64,
    pub checkout_completed: u64,
}

impl SessionTally {
    fn record(&mut self, last: SessionStage) {
        self.sessions += 1;
        match last {
            SessionStage::Browsed => self.ended_after_browse += 1,
            SessionStage::Carted => self.ended_after_cart += 1,
            SessionStage::Abandoned => self.checkout_abandoned += 1,
            SessionStage::Completed => self.checkout_completed += 1,
            // Browsing always happens and checkout always resolves.
            SessionStage::Started | SessionStage::CheckoutStarted => {}
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunnelOutput {
    pub events: Vec<Event>,
    pub orders: Vec<Order>,
    pub items: Vec<OrderItem>,
    pub tally: SessionTally,
}

/// An event before ids and absolute times are assigned.
struct Pending {
    offset_secs: u64,
    kind: EventKind,
    product_id: Option<EntityId>,
    time_on_page: Option<u32>,
}

impl Pending {
    fn page_url(&self) -> String {
        match (self.kind, self.product_id) {
            (EventKind::PageView, _) => "/".into(),
            (_, Some(pid)) => format!("/product/{pid}"),
            (EventKind::CheckoutComplete, _) => "/checkout/success".into(),
            _ => "/checkout".into(),
        }
    }
}

/// Running id counters. Ids are dense and start at 1 for every entity.
#[derive(Default)]
struct IdCounters {
    event: EntityId,
    order: EntityId,
    item: EntityId,
}

impl IdCounters {
    fn next(slot: &mut EntityId) -> EntityId {
        *slot += 1;
        *slot
    }
}

pub struct FunnelSimulator<'a> {
    funnel: &'a FunnelConfig,
    pricing: &'a PricingConfig,
    clock: &'a SimClock,
    products: &'a [Product],
}

impl<'a> FunnelSimulator<'a> {
    pub fn new(
        funnel: &'a FunnelConfig,
        pricing: &'a PricingConfig,
        clock: &'a SimClock,
        products: &'a [Product],
    ) -> Self {
        Self { funnel, pricing, clock, products }
    }

    /// Simulate every customer's sessions, customers in slice order.
    pub fn run(&self, customers: &[Customer], rng: &mut StreamRng) -> SimResult<FunnelOutput> {
        if self.products.is_empty() {
            return Err(SimError::InvalidArgument("funnel needs a non-empty catalog".into()));
        }
        let mut out = FunnelOutput::default();
        let mut ids = IdCounters::default();

        for customer in customers {
            let sessions =
                rng.range_inclusive(self.funnel.sessions_per_customer.lo, self.funnel.sessions_per_customer.hi);
            for seq in 0..sessions {
                let last = self.simulate_session(customer, seq, rng, &mut ids, &mut out)?;
                out.tally.record(last);
            }
        }

        log::info!(
            "{}: {} sessions, {} events, {} orders ({} items), {} abandoned checkouts",
            rng.name,
            out.tally.sessions,
            out.events.len(),
            out.orders.len(),
            out.items.len(),
            out.tally.checkout_abandoned
        );
        Ok(out)
    }

    fn simulate_session(
        &self,
        customer: &Customer,
        seq: u64,
        rng: &mut StreamRng,
        ids: &mut IdCounters,
        out: &mut FunnelOutput,
    ) -> SimResult<SessionStage> {
        let f = self.funnel;
        let started_at = SimClock::uniform_between(rng, customer.created_at, self.clock.as_of);
        let channel = if rng.chance(f.original_channel_probability) {
            customer.acquisition_channel
        } else {
            *rng.pick(Channel::ALL)
        };
        let device = *rng.pick(Device::ALL);
        let session = Session {
            session_id: Session::id_for(customer.customer_id, seq, started_at),
            customer_id: customer.customer_id,
            started_at,
            channel,
            device,
        };

        let mut stage = SessionStage::Started;
        let mut pending = vec![Pending {
            offset_secs: 0,
            kind: EventKind::PageView,
            product_id: None,
            time_on_page: None,
        }];

        // Browse: distinct products, one view every `view_spacing_secs`.
        let browse = rng.range_inclusive(f.products_browsed.lo, f.products_browsed.hi) as usize;
        let viewed: Vec<(&Product, u64)> = rng
            .sample_indices(self.products.len(), browse)
            .into_iter()
            .enumerate()
            .map(|(j, idx)| (&self.products[idx], f.view_spacing_secs.saturating_mul(j as u64 + 1)))
            .collect();
        for (product, offset) in &viewed {
            let dwell = rng.range_inclusive(f.time_on_page_secs.lo, f.time_on_page_secs.hi);
            pending.push(Pending {
                offset_secs: *offset,
                kind: EventKind::ProductView,
                product_id: Some(product.product_id),
                time_on_page: Some(narrow(dwell, "funnel.time_on_page_secs")?),
            });
        }
        stage = stage.advance(SessionStage::Browsed)?;

        // Cart: each viewed product independently.
        let carted: Vec<(&Product, u64)> = viewed
            .iter()
            .filter(|_| rng.chance(f.add_to_cart_probability))
            .copied()
            .collect();
        if carted.is_empty() {
            self.flush(&session, pending, ids, out)?;
            return Ok(stage);
        }
        for (product, view_offset) in &carted {
            let drawn = rng.range_inclusive(f.add_to_cart_offset_secs.lo, f.add_to_cart_offset_secs.hi);
            pending.push(Pending {
                offset_secs: drawn.max(*view_offset),
                kind: EventKind::AddToCart,
                product_id: Some(product.product_id),
                time_on_page: None,
            });
        }
        stage = stage.advance(SessionStage::Carted)?;

        if !rng.chance(f.checkout_probability) {
            self.flush(&session, pending, ids, out)?;
            return Ok(stage);
        }
        let checkout_at = rng.range_inclusive(f.checkout_offset_secs.lo, f.checkout_offset_secs.hi);
        pending.push(Pending {
            offset_secs: checkout_at,
            kind: EventKind::CheckoutStart,
            product_id: None,
            time_on_page: None,
        });
        stage = stage.advance(SessionStage::CheckoutStarted)?;

        if rng.chance(f.abandon_probability) {
            let delay = rng.range_inclusive(f.abandon_delay_secs.lo, f.abandon_delay_secs.hi);
            pending.push(Pending {
                offset_secs: checkout_at.saturating_add(delay),
                kind: EventKind::CheckoutAbandon,
                product_id: None,
                time_on_page: None,
            });
            stage = stage.advance(SessionStage::Abandoned)?;
            self.flush(&session, pending, ids, out)?;
            return Ok(stage);
        }

        let delay = rng.range_inclusive(f.complete_delay_secs.lo, f.complete_delay_secs.hi);
        let completed_offset = checkout_at.saturating_add(delay);
        pending.push(Pending {
            offset_secs: completed_offset,
            kind: EventKind::CheckoutComplete,
            product_id: None,
            time_on_page: None,
        });
        stage = stage.advance(SessionStage::Completed)?;

        let order_id = IdCounters::next(&mut ids.order);
        let mut items = Vec::with_capacity(carted.len());
        for (product, _) in &carted {
            let quantity = narrow(rng.range_inclusive(f.quantity.lo, f.quantity.hi), "funnel.quantity")?;
            items.push(OrderItem::new(
                IdCounters::next(&mut ids.item),
                order_id,
                product.product_id,
                quantity,
                product.price,
            )?);
        }
        let completed_at = checked_add_secs(started_at, completed_offset)?;
        let header = OrderHeader {
            order_id,
            customer_id: customer.customer_id,
            status: *rng.pick_weighted(STATUS_WEIGHTS),
            payment_method: *rng.pick(PaymentMethod::ALL),
            channel,
            session_id: session.session_id.clone(),
            created_at: completed_at,
            completed_at,
        };
        out.orders.push(Order::from_items(header, &items, self.pricing)?);
        out.items.extend(items);

        self.flush(&session, pending, ids, out)?;
        Ok(stage)
    }

    /// Order, stamp, and append a session's events.
    fn flush(
        &self,
        session: &Session,
        mut pending: Vec<Pending>,
        ids: &mut IdCounters,
        out: &mut FunnelOutput,
    ) -> SimResult<()> {
        pending.sort_by_key(|p| (p.offset_secs, p.kind.stage_rank()));
        for p in pending {
            let timestamp = checked_add_secs(session.started_at, p.offset_secs)?;
            out.events.push(Event::new(
                IdCounters::next(&mut ids.event),
                session,
                p.kind,
                p.product_id,
                p.page_url(),
                p.time_on_page,
                timestamp,
            )?);
        }
        Ok(())
    }
}

fn narrow(value: u64, field: &str) -> SimResult<u32> {
    u32::try_from(value).map_err(|_| SimError::InvalidArgument(format!("{field} draw {value} exceeds u32")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_machine_only_moves_forward() {
        use SessionStage::*;
        assert!(Started.can_advance_to(Browsed));
        assert!(CheckoutStarted.can_advance_to(Abandoned));
        assert!(CheckoutStarted.can_advance_to(Completed));
        assert!(!Browsed.can_advance_to(CheckoutStarted), "checkout needs a cart");
        assert!(!Completed.can_advance_to(Abandoned));
        assert!(matches!(
            Carted.advance(Completed),
            Err(SimError::ReferentialIntegrity { entity: "session", .. })
        ));
    }

    #[test]
    fn pages_follow_event_kind() {
        let p = |kind, product_id| Pending { offset_secs: 0, kind, product_id, time_on_page: None };
        assert_eq!(p(EventKind::PageView, None).page_url(), "/");
        assert_eq!(p(EventKind::AddToCart, Some(4)).page_url(), "/product/4");
        assert_eq!(p(EventKind::CheckoutStart, None).page_url(), "/checkout");
        assert_eq!(p(EventKind::CheckoutAbandon, None).page_url(), "/checkout");
        assert_eq!(p(EventKind::CheckoutComplete, None).page_url(), "/checkout/success");
    }
}
