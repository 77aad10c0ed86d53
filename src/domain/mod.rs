//! Core data model shared by every subsystem (spec.md §3).

pub mod action;
pub mod agent;
pub mod alliance;
pub mod company;
pub mod investigation;
pub mod message;
pub mod news;
pub mod order;
pub mod tick_event;
pub mod world;

pub use action::{Action, ActionResult};
pub use agent::{Agent, AgentStatus, Holding};
pub use alliance::{Alliance, AllianceStatus};
pub use company::Company;
pub use investigation::{CrimeType, Investigation, InvestigationStatus};
pub use message::Message;
pub use news::{NewsArticle, NewsSource, NullNewsSource};
pub use order::{Order, OrderStatus, OrderType, Side, Trade};
pub use tick_event::{PriceUpdate, TickEventRecord};
pub use world::{MarketEvent, MarketRegime, WorldState};
