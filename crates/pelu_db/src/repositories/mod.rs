//! Repository modules for database access.

pub mod professional_sql;
pub mod reservation_sql;
pub mod service_sql;

pub use professional_sql::SqlProfessionalRepository;
pub use reservation_sql::SqlReservationRepository;
pub use service_sql::SqlServiceRepository;
