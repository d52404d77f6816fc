//! HTTP request handlers

mod auth;
mod health;
mod menus;
mod route_plans;

pub use auth::{check_permission, login, logout, logout_all, me, refresh};
pub use health::health_check;
pub use menus::get_menus;
pub use route_plans::{create_route_plan, get_route_plan, list_route_plans};
