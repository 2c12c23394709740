//! Compose-form state machine.
//!
//! The page owns exactly one mutable piece of UI state: the compose form.
//! It is modeled here as a value type with pure `(state, event) -> state`
//! transitions so every path the page can take is enumerable and testable.
//! Submission is rejected while an image upload is pending, and requires a
//! completed upload; a failed submission returns to editing with the field
//! values intact.

/// Text fields of the compose form, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pub title: String,
    pub body: String,
    pub author: String,
    pub categories: String,
}

impl FormFields {
    pub fn required_present(&self) -> bool {
        !self.title.trim().is_empty()
            && !self.body.trim().is_empty()
            && !self.author.trim().is_empty()
            && !self.categories.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Body,
    Author,
    Categories,
}

/// Where the image step currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImagePhase {
    #[default]
    Missing,
    /// An upload is in flight; `previous` is the last good URL, restored if
    /// the upload fails.
    Pending { previous: Option<String> },
    Uploaded { url: String },
}

impl ImagePhase {
    pub fn is_pending(&self) -> bool {
        matches!(self, ImagePhase::Pending { .. })
    }

    pub fn uploaded_url(&self) -> Option<&str> {
        match self {
            ImagePhase::Uploaded { url } => Some(url),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FormState {
    /// Form hidden, nothing retained.
    #[default]
    Idle,
    /// Form visible; an image upload may be in flight while fields change.
    Editing { fields: FormFields, image: ImagePhase },
    /// Submission in flight; fields are frozen until the outcome arrives.
    Submitting { fields: FormFields, image_url: String },
    /// Transient confirmation after a successful submit; the form is hidden
    /// and cleared, with a link to the new post when the store returned an id.
    Succeeded { post_id: Option<String> },
}

impl FormState {
    pub fn editing() -> Self {
        FormState::Editing {
            fields: FormFields::default(),
            image: ImagePhase::Missing,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, FormState::Submitting { .. })
    }

    /// The submit guard: all required fields present, upload finished.
    pub fn can_submit(&self) -> bool {
        match self {
            FormState::Editing { fields, image } => {
                fields.required_present() && image.uploaded_url().is_some()
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    /// "Write Post" / "Cancel" toggle.
    Toggled,
    FieldEdited { field: Field, value: String },
    /// A file was chosen; its upload starts immediately.
    ImageSelected,
    ImageUploaded { url: String },
    ImageUploadFailed,
    SubmitRequested,
    SubmitSucceeded { post_id: Option<String> },
    SubmitFailed,
}

/// Pure transition function. Events that do not apply to the current state
/// leave it unchanged.
pub fn transition(state: FormState, event: FormEvent) -> FormState {
    match (state, event) {
        (FormState::Idle, FormEvent::Toggled) => FormState::editing(),
        (FormState::Succeeded { .. }, FormEvent::Toggled) => FormState::editing(),
        (FormState::Editing { .. }, FormEvent::Toggled) => FormState::Idle,

        (FormState::Editing { mut fields, image }, FormEvent::FieldEdited { field, value }) => {
            match field {
                Field::Title => fields.title = value,
                Field::Body => fields.body = value,
                Field::Author => fields.author = value,
                Field::Categories => fields.categories = value,
            }
            FormState::Editing { fields, image }
        }

        (FormState::Editing { fields, image }, FormEvent::ImageSelected) => FormState::Editing {
            fields,
            image: ImagePhase::Pending {
                previous: image.uploaded_url().map(str::to_string),
            },
        },
        (FormState::Editing { fields, image }, FormEvent::ImageUploaded { url }) => {
            if image.is_pending() {
                FormState::Editing {
                    fields,
                    image: ImagePhase::Uploaded { url },
                }
            } else {
                FormState::Editing { fields, image }
            }
        }
        (FormState::Editing { fields, image }, FormEvent::ImageUploadFailed) => {
            let image = match image {
                ImagePhase::Pending {
                    previous: Some(url),
                } => ImagePhase::Uploaded { url },
                ImagePhase::Pending { previous: None } => ImagePhase::Missing,
                other => other,
            };
            FormState::Editing { fields, image }
        }

        (FormState::Editing { fields, image }, FormEvent::SubmitRequested) => match image {
            ImagePhase::Uploaded { url } if fields.required_present() => FormState::Submitting {
                fields,
                image_url: url,
            },
            other => FormState::Editing {
                fields,
                image: other,
            },
        },

        (FormState::Submitting { .. }, FormEvent::SubmitSucceeded { post_id }) => {
            FormState::Succeeded { post_id }
        }
        (FormState::Submitting { fields, image_url }, FormEvent::SubmitFailed) => {
            FormState::Editing {
                fields,
                image: ImagePhase::Uploaded { url: image_url },
            }
        }

        (state, _) => state,
    }
}
