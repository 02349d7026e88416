//! Deterministic customer name and location generation from curated lists.
//!
//! All generation is deterministic (same RNG seed = same names).

use crate::rng::StreamRng;

/// Deterministic name generator using curated name lists
pub struct NameGenerator;

impl NameGenerator {
    pub fn generate_first_name(rng: &mut StreamRng) -> &'static str {
        *rng.pick(Self::first_names())
    }

    pub fn generate_last_name(rng: &mut StreamRng) -> &'static str {
        *rng.pick(Self::last_names())
    }

    /// Contact handle; the id suffix keeps handles unique per run.
    pub fn email_for(first: &str, last: &str, customer_id: i64) -> String {
        format!("{}.{}{customer_id}@example.com", first.to_lowercase(), last.to_lowercase())
    }

    /// One draw picks both halves, so a city never lands in the wrong region.
    pub fn generate_location(rng: &mut StreamRng) -> (&'static str, &'static str) {
        *rng.pick(Self::locations())
    }

    fn first_names() -> &'static [&'static str] {
        &[
            "Emma", "Liam", "Olivia", "Noah", "Ava", "Ethan", "Sophia", "Mason",
            "Isabella", "James", "Mia", "Benjamin", "Charlotte", "Lucas", "Amelia",
            "Henry", "Harper", "Alexander", "Evelyn", "Daniel", "Abigail", "Jack",
            "Emily", "Sebastian", "Ella", "Owen", "Scarlett", "Ryan", "Grace", "Leo",
            "Aria", "Nathan", "Lily", "Caleb", "Chloe", "Isaac", "Zoey", "Connor",
            "Hannah", "Dylan", "Nora", "Wyatt", "Riley", "Luke", "Stella", "Andrew",
            "Penelope", "Jayden", "Layla", "Gabriel",
        ]
    }

    fn last_names() -> &'static [&'static str] {
        &[
            "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller",
            "Davis", "Rodriguez", "Martinez", "Hernandez", "Lopez", "Gonzalez",
            "Wilson", "Anderson", "Thomas", "Taylor", "Moore", "Jackson", "Martin",
            "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez", "Clark",
            "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King",
            "Wright", "Scott", "Torres", "Nguyen", "Hill", "Flores", "Green",
            "Adams", "Nelson", "Baker", "Hall", "Rivera", "Campbell", "Mitchell",
            "Carter", "Roberts",
        ]
    }

    /// (city, region) pairs.
    fn locations() -> &'static [(&'static str, &'static str)] {
        &[
            ("Austin", "TX"),
            ("Portland", "OR"),
            ("Denver", "CO"),
            ("Chicago", "IL"),
            ("Seattle", "WA"),
            ("New York", "NY"),
            ("Los Angeles", "CA"),
            ("Miami", "FL"),
            ("Boston", "MA"),
            ("Atlanta", "GA"),
        ]
    }
}
