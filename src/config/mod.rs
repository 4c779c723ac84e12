pub mod ai;

pub use ai::AnalystConfig;
