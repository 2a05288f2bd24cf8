use iced::font::Weight;
use iced::widget::image::Handle;
use iced::widget::{button, column, container, horizontal_space, row, scrollable, text, Column, Image};
use iced::{Alignment, Element, Font, Length, Task, Theme};
use std::sync::Arc;
use tracing::{debug, info, warn};

mod config;
mod error;
mod ml;
mod platform;
mod state;

#[cfg(test)]
mod scenarios;
#[cfg(test)]
mod testing;

use config::{AppConfig, APP_DIR_NAME};
use error::{CaptureError, InferenceError, ModelLoadError};
use ml::classifier::{self, Classifier};
use ml::custom::{self, SelfCheckReport};
use ml::pipeline;
use ml::runtime::{RuntimeHandle, RuntimeInfo};
use platform::capture::{self, CaptureAdapter, CaptureOptions, PickerCapture};
use platform::permissions::{self, CapabilityGateway, DialogGateway};
use state::data::{Capability, ImageRef, PermissionState, PredictionList};
use state::session::{
    FlowController, LoadStatus, PredictRequest, PredictTicket, Readiness, SessionPhase,
};

const BOLD: Font = Font {
    weight: Weight::Bold,
    ..Font::DEFAULT
};

/// Collaborators the controller's actions are carried out with
struct Services {
    config: AppConfig,
    runtime: RuntimeHandle,
    gateway: Arc<dyn CapabilityGateway>,
    capture: Arc<dyn CaptureAdapter>,
    capture_options: CaptureOptions,
}

impl Services {
    /// Real dialogs, real picker, real ONNX Runtime
    fn from_config(config: AppConfig) -> Self {
        let cache_dir = PickerCapture::default_cache_dir().unwrap_or_else(|| {
            warn!("⚠️  Could not determine cache directory, storing captures in temp dir");
            std::env::temp_dir().join(APP_DIR_NAME)
        });

        Self {
            runtime: RuntimeHandle::new(APP_DIR_NAME),
            gateway: Arc::new(DialogGateway::new(&config.granted_capabilities)),
            capture: Arc::new(PickerCapture::new(cache_dir)),
            capture_options: CaptureOptions::from_config(&config.capture),
            config,
        }
    }
}

/// Main application state
struct SnapClassifier {
    /// Session state (permissions, readiness, image, predictions)
    controller: FlowController,
    services: Services,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// Startup: numeric runtime initialization finished
    RuntimeInitialized(Result<RuntimeInfo, ModelLoadError>),
    /// Startup: generic classifier load finished
    ClassifierLoaded(Result<Arc<dyn Classifier>, ModelLoadError>),
    /// Startup: custom model loaded and self-checked (diagnostic only)
    CustomModelChecked(Result<SelfCheckReport, ModelLoadError>),
    /// A capability request was answered
    PermissionResolved(Capability, PermissionState),
    /// User clicked "Take image"
    TakeImage,
    /// Storage permission answered during "Take image"
    StorageResolved(PermissionState),
    /// The picker closed (`None` = cancelled)
    Captured(Result<Option<ImageRef>, CaptureError>),
    /// User clicked "Predict"
    Predict,
    /// Background classification finished
    Predicted(PredictTicket, Result<PredictionList, InferenceError>),
    /// User clicked "Reset"
    Reset,
}

impl SnapClassifier {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        Self::with_services(Services::from_config(AppConfig::load()))
    }

    /// Start the four startup tasks. They race; each one updates its own
    /// slice of state when it lands.
    fn with_services(services: Services) -> (Self, Task<Message>) {
        let runtime = services.runtime.clone();
        let custom_runtime = services.runtime.clone();
        let descriptor_path = services.config.custom_descriptor_path();

        let startup = Task::batch([
            Task::perform(
                async move { runtime.init().await },
                Message::RuntimeInitialized,
            ),
            Task::perform(
                permissions::request_capability(services.gateway.clone(), Capability::Camera),
                |state| Message::PermissionResolved(Capability::Camera, state),
            ),
            Task::perform(
                classifier::load_classifier(services.config.clone()),
                Message::ClassifierLoaded,
            ),
            Task::perform(
                custom::load_custom_model(custom_runtime, descriptor_path),
                Message::CustomModelChecked,
            ),
        ]);

        info!("🎨 Snap Classifier starting");

        (
            SnapClassifier {
                controller: FlowController::new(),
                services,
            },
            startup,
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::RuntimeInitialized(result) => {
                self.controller.on_runtime_initialized(result);
                Task::none()
            }
            Message::ClassifierLoaded(result) => {
                self.controller.on_classifier_loaded(result);
                Task::none()
            }
            Message::CustomModelChecked(result) => {
                self.controller.on_custom_model_checked(result);
                Task::none()
            }
            Message::PermissionResolved(capability, state) => {
                self.controller.set_permission(capability, state);
                Task::none()
            }
            Message::TakeImage => Task::perform(
                permissions::request_capability(
                    self.services.gateway.clone(),
                    Capability::WriteStorage,
                ),
                Message::StorageResolved,
            ),
            Message::StorageResolved(state) => {
                self.controller.set_permission(Capability::WriteStorage, state);

                match self.controller.capture_allowed() {
                    Ok(()) => Task::perform(
                        capture::capture(
                            self.services.capture.clone(),
                            self.services.capture_options.clone(),
                        ),
                        Message::Captured,
                    ),
                    Err(reason) => {
                        info!("Capture refused: {}", reason);
                        Task::none()
                    }
                }
            }
            Message::Captured(Ok(image)) => {
                self.controller.on_captured(image);
                Task::none()
            }
            Message::Captured(Err(e)) => {
                warn!("⚠️  Capture failed: {}", e);
                Task::none()
            }
            Message::Predict => match self.controller.begin_predict() {
                Ok(PredictRequest { ticket, classifier }) => Task::perform(
                    pipeline::classify(ticket.image.clone(), classifier),
                    move |result| Message::Predicted(ticket.clone(), result),
                ),
                Err(reason) => {
                    debug!("Predict ignored: {}", reason);
                    Task::none()
                }
            },
            Message::Predicted(ticket, result) => {
                self.controller.on_predicted(&ticket, result);
                Task::none()
            }
            Message::Reset => {
                if let Err(reason) = self.controller.reset() {
                    debug!("Reset ignored: {}", reason);
                }
                Task::none()
            }
        }
    }

    /// One-line summary of readiness, permissions and the last failure
    fn status_line(&self) -> String {
        let readiness = match self.controller.readiness() {
            Readiness::Loading => "Loading model...".to_string(),
            Readiness::Ready => "Model ready".to_string(),
            Readiness::Unavailable(reason) => format!("Model unavailable: {}", reason),
        };
        let custom = match self.controller.custom_model() {
            LoadStatus::Pending => "checking",
            LoadStatus::Loaded(_) => "ok",
            LoadStatus::Failed(_) => "unavailable",
        };
        let camera = self.controller.permission(Capability::Camera);
        let storage = self.controller.permission(Capability::WriteStorage);

        let mut status = format!(
            "{} | Custom model: {} | Camera: {:?} | Storage: {:?}",
            readiness, custom, camera, storage
        );
        if let Some(error) = self.controller.last_error() {
            status.push_str(&format!(" | Prediction failed: {}", error));
        }
        status
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let controls: Column<Message> = column![
            button("Take image")
                .on_press(Message::TakeImage)
                .padding(10),
            button("Predict")
                .on_press_maybe(self.controller.can_predict().then_some(Message::Predict))
                .padding(10),
            button("Reset")
                .on_press_maybe(self.controller.can_reset().then_some(Message::Reset))
                .padding(10),
        ]
        .spacing(20)
        .align_x(Alignment::Center);

        let mut content = column![text(self.status_line()).size(14), controls]
            .spacing(20)
            .padding(20)
            .align_x(Alignment::Center);

        if let Some(image) = self.controller.image() {
            if let Some(path) = image.local_path() {
                content = content.push(
                    Image::new(Handle::from_path(path))
                        .width(Length::Fixed(200.0))
                        .height(Length::Fixed(200.0)),
                );
            }
            let name = image.file_name.as_deref().unwrap_or(image.uri.as_str());
            content = content.push(
                text(format!("{} ({}x{})", name, image.width, image.height)).size(12),
            );
        }

        let mut table = column![row![
            text("Classname").font(BOLD),
            horizontal_space(),
            text("Probability").font(BOLD),
        ]]
        .spacing(8);

        for prediction in self.controller.predictions() {
            table = table.push(row![
                text(prediction.class_name.as_str()),
                horizontal_space(),
                text(format!("{:.4}", prediction.probability)),
            ]);
        }

        let hint = match self.controller.phase() {
            SessionPhase::NoImage => Some("Take an image to classify it"),
            SessionPhase::ImageCaptured => Some("Press Predict to classify the image"),
            SessionPhase::Predicted if self.controller.predictions().is_empty() => {
                Some("The classifier returned no labels")
            }
            SessionPhase::Predicted => None,
        };
        if let Some(hint) = hint {
            table = table.push(text(hint).size(12));
        }

        content = content.push(scrollable(table).height(Length::Fill));

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Set up `tracing` output, `RUST_LOG` overrides the default filter
fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("snap_classifier=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> iced::Result {
    init_tracing();

    iced::application("Snap Classifier", SnapClassifier::update, SnapClassifier::view)
        .theme(SnapClassifier::theme)
        .centered()
        .run_with(SnapClassifier::new)
}
