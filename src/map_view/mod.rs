//! Selection-preserving snapshot rendering for a map view.
//!
//! Snapshots arrive from the relay stream and are rendered into a GeoJSON
//! feature collection; a pick on a rendered aircraft toggles the selection,
//! which then survives every following snapshot. All state is owned by a
//! [`MapView`] consuming a single ordered event queue.

mod identifier;
mod render;
mod selection;
mod view;

pub use identifier::{is_blank, same_aircraft};
pub use render::{
    PROP_BARO_ALTITUDE, PROP_CALLSIGN, PROP_GEO_ALTITUDE, PROP_ICAO24, PROP_ICON_ROTATE,
    PROP_LATITUDE, PROP_LONGITUDE, PROP_ON_GROUND, PROP_ORIGIN_COUNTRY, PROP_POSITION_SOURCE,
    PROP_SELECTED, PROP_SQUAWK, PROP_VELOCITY, PointGeometry, RenderFeature, RenderSet,
    RotationConvention, SnapshotRenderer,
};
pub use selection::{PickedFeature, SelectionController, SelectionState};
pub use view::{MapEvent, MapSink, MapView};
