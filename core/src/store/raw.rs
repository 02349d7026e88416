use super::{SimStore, RAW_TABLES};
use crate::{
    catalog::Product,
    clock::{format_ts, parse_ts},
    customer::Customer,
    error::SimResult,
    experiment::{AbAssignment, AbTest, ExperimentOutput},
    funnel::{Event, FunnelOutput},
    order::{Order, OrderItem},
    types::Label,
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, types::Type, Row};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn ts_at(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let s: String = row.get(idx)?;
    parse_ts(&s).map_err(|e| conversion_error(idx, e))
}

fn date_at(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn label_at<T: Label>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    T::parse(&s).map_err(|e| conversion_error(idx, e))
}

impl SimStore {
    // ── Checkpoint 1: catalog + customers ─────────────────────────

    /// Discard every raw row, then write products and customers.
    /// One transaction: either the fresh population lands or nothing changes.
    pub fn write_catalog_checkpoint(
        &mut self,
        products: &[Product],
        customers: &[Customer],
    ) -> SimResult<()> {
        let tx = self.conn.transaction()?;
        for table in RAW_TABLES.iter().rev() {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO raw_products (product_id, name, category, price, compare_at_price, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for p in products {
                stmt.execute(params![
                    p.product_id,
                    &p.name,
                    &p.category,
                    p.price,
                    p.compare_at_price,
                    format_ts(p.created_at),
                ])?;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT INTO raw_customers (
                    customer_id, email, first_name, last_name, acquisition_channel,
                    created_at, last_active_at, city, region
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for c in customers {
                stmt.execute(params![
                    c.customer_id,
                    &c.email,
                    &c.first_name,
                    &c.last_name,
                    c.acquisition_channel.as_str(),
                    format_ts(c.created_at),
                    format_ts(c.last_active_at),
                    &c.city,
                    &c.region,
                ])?;
            }
        }
        tx.commit()?;
        log::debug!(
            "checkpoint catalog: {} products, {} customers committed",
            products.len(),
            customers.len()
        );
        Ok(())
    }

    // ── Checkpoint 2: events + orders ─────────────────────────────

    pub fn write_funnel_checkpoint(&mut self, funnel: &FunnelOutput) -> SimResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO raw_events (
                    event_id, customer_id, session_id, event_type, product_id,
                    attribution_channel, device_type, page_url, time_on_page, event_timestamp
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for e in &funnel.events {
                stmt.execute(params![
                    e.event_id,
                    e.customer_id,
                    &e.session_id,
                    e.kind.as_str(),
                    e.product_id,
                    e.channel.as_str(),
                    e.device.as_str(),
                    &e.page_url,
                    e.time_on_page,
                    format_ts(e.timestamp),
                ])?;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT INTO raw_orders (
                    order_id, customer_id, subtotal, tax, shipping, total, status,
                    payment_method, attribution_channel, session_id, created_at, completed_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            for o in &funnel.orders {
                stmt.execute(params![
                    o.order_id,
                    o.customer_id,
                    o.subtotal,
                    o.tax,
                    o.shipping,
                    o.total,
                    o.status.as_str(),
                    o.payment_method.as_str(),
                    o.channel.as_str(),
                    &o.session_id,
                    format_ts(o.created_at),
                    format_ts(o.completed_at),
                ])?;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT INTO raw_order_items (item_id, order_id, product_id, quantity, unit_price)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for i in &funnel.items {
                stmt.execute(params![i.item_id, i.order_id, i.product_id, i.quantity, i.unit_price])?;
            }
        }
        tx.commit()?;
        log::debug!(
            "checkpoint funnel: {} events, {} orders, {} items committed",
            funnel.events.len(),
            funnel.orders.len(),
            funnel.items.len()
        );
        Ok(())
    }

    // ── Checkpoint 3: experiments ─────────────────────────────────

    pub fn write_experiment_checkpoint(&mut self, experiments: &ExperimentOutput) -> SimResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO raw_ab_tests (test_id, test_name, description, metric, start_date, end_date, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for t in &experiments.tests {
                stmt.execute(params![
                    t.test_id,
                    &t.name,
                    &t.description,
                    t.metric.as_str(),
                    t.start_date.format(DATE_FORMAT).to_string(),
                    t.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
                    t.status.as_str(),
                ])?;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT INTO raw_ab_assignments (
                    assignment_id, test_id, customer_id, variant, assigned_at, converted, conversion_value
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for a in &experiments.assignments {
                stmt.execute(params![
                    a.assignment_id,
                    a.test_id,
                    a.customer_id,
                    a.variant.as_str(),
                    format_ts(a.assigned_at),
                    a.converted as i64,
                    a.conversion_value,
                ])?;
            }
        }
        tx.commit()?;
        log::debug!(
            "checkpoint experiments: {} tests, {} assignments committed",
            experiments.tests.len(),
            experiments.assignments.len()
        );
        Ok(())
    }

    // ── Readers ───────────────────────────────────────────────────

    pub fn load_products(&self) -> SimResult<Vec<Product>> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, name, category, price, compare_at_price, created_at
             FROM raw_products ORDER BY product_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Product {
                product_id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
                price: row.get(3)?,
                compare_at_price: row.get(4)?,
                created_at: ts_at(row, 5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn load_customers(&self) -> SimResult<Vec<Customer>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, email, first_name, last_name, acquisition_channel,
                    created_at, last_active_at, city, region
             FROM raw_customers ORDER BY customer_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Customer {
                customer_id: row.get(0)?,
                email: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                acquisition_channel: label_at(row, 4)?,
                created_at: ts_at(row, 5)?,
                last_active_at: ts_at(row, 6)?,
                city: row.get(7)?,
                region: row.get(8)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Events grouped by session, then in emission order.
    pub fn load_events(&self) -> SimResult<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, customer_id, session_id, event_type, product_id,
                    attribution_channel, device_type, page_url, time_on_page, event_timestamp
             FROM raw_events ORDER BY session_id, event_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Event {
                event_id: row.get(0)?,
                customer_id: row.get(1)?,
                session_id: row.get(2)?,
                kind: label_at(row, 3)?,
                product_id: row.get(4)?,
                channel: label_at(row, 5)?,
                device: label_at(row, 6)?,
                page_url: row.get(7)?,
                time_on_page: row.get(8)?,
                timestamp: ts_at(row, 9)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn load_orders(&self) -> SimResult<Vec<Order>> {
        let mut stmt = self.conn.prepare(
            "SELECT order_id, customer_id, subtotal, tax, shipping, total, status,
                    payment_method, attribution_channel, session_id, created_at, completed_at
             FROM raw_orders ORDER BY order_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Order {
                order_id: row.get(0)?,
                customer_id: row.get(1)?,
                subtotal: row.get(2)?,
                tax: row.get(3)?,
                shipping: row.get(4)?,
                total: row.get(5)?,
                status: label_at(row, 6)?,
                payment_method: label_at(row, 7)?,
                channel: label_at(row, 8)?,
                session_id: row.get(9)?,
                created_at: ts_at(row, 10)?,
                completed_at: ts_at(row, 11)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn load_order_items(&self) -> SimResult<Vec<OrderItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id, order_id, product_id, quantity, unit_price
             FROM raw_order_items ORDER BY item_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(OrderItem {
                item_id: row.get(0)?,
                order_id: row.get(1)?,
                product_id: row.get(2)?,
                quantity: row.get(3)?,
                unit_price: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn load_ab_tests(&self) -> SimResult<Vec<AbTest>> {
        let mut stmt = self.conn.prepare(
            "SELECT test_id, test_name, description, metric, start_date, end_date, status
             FROM raw_ab_tests ORDER BY test_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AbTest {
                test_id: row.get(0)?,
                name: row.get(1)?,
                description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                metric: label_at(row, 3)?,
                start_date: date_at(row, 4)?
                    .ok_or_else(|| rusqlite::Error::InvalidColumnType(4, "start_date".into(), Type::Null))?,
                end_date: date_at(row, 5)?,
                status: label_at(row, 6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn load_assignments(&self) -> SimResult<Vec<AbAssignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT assignment_id, test_id, customer_id, variant, assigned_at, converted, conversion_value
             FROM raw_ab_assignments ORDER BY assignment_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AbAssignment {
                assignment_id: row.get(0)?,
                test_id: row.get(1)?,
                customer_id: row.get(2)?,
                variant: label_at(row, 3)?,
                assigned_at: ts_at(row, 4)?,
                converted: row.get::<_, i64>(5)? != 0,
                conversion_value: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
