pub mod analytics;
pub mod domain;
pub mod ports;

pub use domain::{
    AuthSession, FinalMetrics, Interaction, InteractionKind, NewInteraction, NewSample, Sample,
    Session, User, UserCredentials,
};
pub use ports::{DatabaseService, PortError, PortResult, SummaryGenerationService};
