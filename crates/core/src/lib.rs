pub mod attribute;
pub mod event;
pub mod marker;
pub mod money;
pub mod movement;
pub mod operation;
pub mod period;
pub mod store;
pub mod window;

pub use attribute::{Attribute, Value};
pub use event::{Event, EventId, Gauge, InsertionType, Link, LinkMode};
pub use marker::{MarkerError, MarkerStatus, UpdateMarker, UPDATE_MONTH, UPDATE_YEAR};
pub use money::{Money, ParseMoneyError};
pub use movement::{Movement, Tag, TagSource, INCOME_NO_GROUP, NO_ENTITY, SPENDING_NO_GROUP};
pub use operation::{Completeness, DimSignature, SourceMetadata, WriteMode, WriteOperation};
pub use period::{epoch, iso, Granularity, Period, ValidityInterval, ISO_FORMAT};
pub use store::{EventQuery, EventStore, NameMatch, OrderBy, StoreError, TimeFilter, TimeOp, ValueFilter};
pub use window::{plan_windows, plan_windows_from_str, WindowPlanningError};
