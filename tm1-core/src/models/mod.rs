//! Domain models.

pub mod cellset;
pub mod chore;
pub mod log;
pub mod user;

pub use cellset::{
    Cell, CellMap, CellProperties, CellProperty, Cellset, CellsetAxis, DEFAULT_CELL_PROPERTIES,
    Member, Tuple, ordinal_to_indices,
};
pub use chore::{
    Chore, ChoreFrequency, ChoreTask, ChoreTaskParameter, ExecutionMode, local_start_time_body,
    parse_start_time,
};
pub use log::{DeltaPage, LogTail, delta_link_endpoint};
pub use user::{ActiveUser, Group};
