//! Stateless repositories, one per table. Each takes a pool or connection
//! explicitly so callers can compose them inside a transaction.

pub mod audit_repo;
pub mod flow_repo;
pub mod template_repo;

pub use audit_repo::AuditRepo;
pub use flow_repo::FlowRepo;
pub use template_repo::TemplateRepo;
