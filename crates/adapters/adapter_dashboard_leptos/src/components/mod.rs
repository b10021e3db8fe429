mod area_table;
mod automation_table;
mod chart;
mod device_table;
mod entity_table;
mod event_table;
mod nav;
mod stat_card;

pub use area_table::AreaTable;
pub use automation_table::AutomationTable;
pub use chart::HistoryChart;
pub use device_table::DeviceTable;
pub use entity_table::EntityTable;
pub use event_table::EventTable;
pub use nav::Nav;
pub use stat_card::StatCard;
