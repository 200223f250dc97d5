//! Contract with the thermostat service.

use crate::error::ApiResult;
use crate::snapshot::ZoneSnapshot;

/// Everything the control loop needs from the outside world.
///
/// Calls are blocking. Any of them may fail transiently; the loop handles
/// that by backing off, so implementations should not retry internally.
pub trait HeatingApi {
    /// Current state of every zone.
    fn list_zones(&mut self) -> ApiResult<Vec<ZoneSnapshot>>;

    /// Outdoor temperature (°C).
    fn outside_temperature(&mut self) -> ApiResult<f64>;

    /// Flow temperature the boiler is currently set to.
    fn current_flow_temperature(&mut self) -> ApiResult<f64>;

    /// Command a new flow temperature.
    fn set_flow_temperature(&mut self, value: i32) -> ApiResult<()>;
}

impl<T: HeatingApi + ?Sized> HeatingApi for &mut T {
    fn list_zones(&mut self) -> ApiResult<Vec<ZoneSnapshot>> {
        (**self).list_zones()
    }

    fn outside_temperature(&mut self) -> ApiResult<f64> {
        (**self).outside_temperature()
    }

    fn current_flow_temperature(&mut self) -> ApiResult<f64> {
        (**self).current_flow_temperature()
    }

    fn set_flow_temperature(&mut self, value: i32) -> ApiResult<()> {
        (**self).set_flow_temperature(value)
    }
}
