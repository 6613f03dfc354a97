pub mod event;
pub mod notification;
pub mod prediction;
pub mod response;
pub mod user;

pub use event::{timeline, PredictionEvent};
pub use notification::{DeadlineNotification, NotificationToggle};
pub use prediction::{
    NewPrediction, Outcome, Prediction, PredictionFilter, PredictionStatus, PredictionUpdate,
    ValidationErrors,
};
pub use response::{NewResponse, Response, ResponseDraft};
pub use user::{UserId, UserRef};
