pub mod audit_log;
pub mod consumable_item;
pub mod stock_movement;

pub use audit_log::OperationKind;
pub use stock_movement::MovementKind;
