pub mod ids;
pub mod latency;

pub use ids::random_id;
pub use latency::SimulatedLatency;
