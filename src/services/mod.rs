pub mod audit;
pub mod identity;
pub mod links;
pub mod meals;
pub mod metrics;
pub mod parents;
pub mod students;
