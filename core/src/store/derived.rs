use super::SimStore;
use crate::error::SimResult;

impl SimStore {
    // ── Transformation units ──────────────────────────────────────

    /// Run one unit's SQL as a single transaction. On error the
    /// transaction rolls back on drop and the previous table survives.
    pub fn execute_unit(&mut self, sql: &str) -> SimResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.commit()?;
        Ok(())
    }

    /// Derived tables currently present, by name.
    pub fn derived_tables(&self) -> SimResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table'
               AND (name LIKE 'stg\\_%' ESCAPE '\\'
                    OR name LIKE 'dim\\_%' ESCAPE '\\'
                    OR name LIKE 'fact\\_%' ESCAPE '\\'
                    OR name LIKE 'analytics\\_%' ESCAPE '\\')
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }
}
