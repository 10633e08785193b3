pub mod error;
pub mod evidence;
pub mod geofence;
pub mod overlay;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

/// The service as wired into the HTTP server.
pub type AppAttendanceService =
    service::AttendanceService<store::MySqlAttendanceStore, evidence::LocalEvidenceStore>;
