//! Cross-entity invariant checks, run before each generation checkpoint
//! commits. A failure here is a generator bug, never bad input.

use crate::{
    catalog::Product,
    config::PricingConfig,
    customer::Customer,
    error::{SimError, SimResult},
    experiment::ExperimentOutput,
    funnel::{Event, FunnelOutput},
    order::OrderItem,
    types::{EntityId, EventKind, Label},
};
use std::collections::{BTreeMap, HashMap, HashSet};

pub fn verify_customers(customers: &[Customer]) -> SimResult<()> {
    let mut seen = HashSet::with_capacity(customers.len());
    for c in customers {
        if !seen.insert(c.customer_id) {
            return Err(SimError::integrity("customer", format!("duplicate id #{}", c.customer_id)));
        }
        if c.last_active_at < c.created_at {
            return Err(SimError::integrity(
                "customer",
                format!("#{} active before signup", c.customer_id),
            ));
        }
    }
    Ok(())
}

pub fn verify_funnel(
    customers: &[Customer],
    products: &[Product],
    funnel: &FunnelOutput,
    pricing: &PricingConfig,
) -> SimResult<()> {
    let customer_ids: HashSet<EntityId> = customers.iter().map(|c| c.customer_id).collect();
    let product_ids: HashSet<EntityId> = products.iter().map(|p| p.product_id).collect();

    let mut sessions: BTreeMap<&str, Vec<&Event>> = BTreeMap::new();
    for e in &funnel.events {
        if !customer_ids.contains(&e.customer_id) {
            return Err(SimError::integrity("event", format!("#{} unknown customer #{}", e.event_id, e.customer_id)));
        }
        match e.product_id {
            Some(pid) if !product_ids.contains(&pid) => {
                return Err(SimError::integrity("event", format!("#{} unknown product #{pid}", e.event_id)));
            }
            _ => {}
        }
        sessions.entry(e.session_id.as_str()).or_default().push(e);
    }
    for (session_id, events) in &sessions {
        verify_session(session_id, events)?;
    }

    let mut items_by_order: HashMap<EntityId, Vec<&OrderItem>> = HashMap::new();
    for item in &funnel.items {
        if !product_ids.contains(&item.product_id) {
            return Err(SimError::integrity(
                "order_item",
                format!("#{} unknown product #{}", item.item_id, item.product_id),
            ));
        }
        items_by_order.entry(item.order_id).or_default().push(item);
    }

    let mut order_ids = HashSet::with_capacity(funnel.orders.len());
    for order in &funnel.orders {
        order_ids.insert(order.order_id);
        if !customer_ids.contains(&order.customer_id) {
            return Err(SimError::integrity("order", format!("#{} unknown customer", order.order_id)));
        }
        order.totals().reconcile(pricing).map_err(|d| SimError::integrity("order", format!("#{}: {d}", order.order_id)))?;
        let items = items_by_order.get(&order.order_id).map(Vec::as_slice).unwrap_or_default();
        if items.is_empty() || !order.matches_items(items.iter().copied()) {
            return Err(SimError::integrity(
                "order",
                format!("#{} subtotal {} does not match its {} items", order.order_id, order.subtotal, items.len()),
            ));
        }
        let completed = sessions
            .get(order.session_id.as_str())
            .map(|evs| evs.iter().any(|e| e.kind == EventKind::CheckoutComplete))
            .unwrap_or(false);
        if !completed {
            return Err(SimError::integrity(
                "order",
                format!("#{} session {} never completed checkout", order.order_id, order.session_id),
            ));
        }
    }
    if let Some(orphan) = funnel.items.iter().find(|i| !order_ids.contains(&i.order_id)) {
        return Err(SimError::integrity(
            "order_item",
            format!("#{} points at missing order #{}", orphan.item_id, orphan.order_id),
        ));
    }
    Ok(())
}

/// One session's events must be time-ordered and respect stage order.
pub fn verify_session(session_id: &str, events: &[&Event]) -> SimResult<()> {
    let fail = |detail: String| Err(SimError::integrity("session", format!("{session_id}: {detail}")));

    let Some(first) = events.first() else {
        return Ok(());
    };
    if first.kind != EventKind::PageView {
        return fail(format!("opens with {}", first.kind.as_str()));
    }
    if events.windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
        return fail("timestamps go backwards".into());
    }

    let mut viewed_at = HashMap::new();
    let mut latest_cart = None;
    let mut checkout_at = None;
    let mut outcomes = 0;
    for e in events {
        match e.kind {
            EventKind::PageView => {
                if e.event_id != first.event_id {
                    return fail("second page_view".into());
                }
            }
            EventKind::ProductView => {
                if let Some(pid) = e.product_id {
                    viewed_at.insert(pid, e.timestamp);
                }
            }
            EventKind::AddToCart => {
                let viewed = e.product_id.and_then(|pid| viewed_at.get(&pid));
                match viewed {
                    Some(t) if *t <= e.timestamp => {}
                    _ => return fail(format!("add_to_cart #{} before its product_view", e.event_id)),
                }
                latest_cart = latest_cart.max(Some(e.timestamp));
            }
            EventKind::CheckoutStart => {
                if latest_cart.is_none() {
                    return fail("checkout_start with an empty cart".into());
                }
                checkout_at = Some(e.timestamp);
            }
            EventKind::CheckoutAbandon | EventKind::CheckoutComplete => {
                if checkout_at.is_none() {
                    return fail(format!("{} without checkout_start", e.kind.as_str()));
                }
                outcomes += 1;
            }
        }
    }
    if let (Some(cart), Some(checkout)) = (latest_cart, checkout_at) {
        if cart > checkout {
            return fail("add_to_cart after checkout_start".into());
        }
    }
    if outcomes > 1 {
        return fail("more than one checkout outcome".into());
    }
    Ok(())
}

pub fn verify_experiments(customers: &[Customer], experiments: &ExperimentOutput) -> SimResult<()> {
    let customer_ids: HashSet<EntityId> = customers.iter().map(|c| c.customer_id).collect();
    let test_ids: HashSet<EntityId> = experiments.tests.iter().map(|t| t.test_id).collect();
    let mut pairs = HashSet::with_capacity(experiments.assignments.len());

    for a in &experiments.assignments {
        if !test_ids.contains(&a.test_id) || !customer_ids.contains(&a.customer_id) {
            return Err(SimError::integrity(
                "ab_assignment",
                format!("#{} references test #{} / customer #{}", a.assignment_id, a.test_id, a.customer_id),
            ));
        }
        if !pairs.insert((a.test_id, a.customer_id)) {
            return Err(SimError::integrity(
                "ab_assignment",
                format!("customer #{} assigned twice to test #{}", a.customer_id, a.test_id),
            ));
        }
        if !a.converted && a.conversion_value != 0.0 {
            return Err(SimError::integrity(
                "ab_assignment",
                format!("#{} has value without conversion", a.assignment_id),
            ));
        }
    }
    Ok(())
}
