pub mod db;
pub mod memory;
pub mod password;

pub use dangdai_core::memory::InMemoryProgressStore;
pub use db::DbAdapter;
pub use memory::InMemoryAuthService;
