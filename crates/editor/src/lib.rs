//! # tabula-editor
//!
//! Server-side request processor for a tabular editing protocol. One
//! [`Editor`] maps a flat wire record onto one or more tables, including
//! left-joined tables and one-to-many / many-to-many joins, and answers
//! read, create, edit, remove and upload requests.
//!
//! ```no_run
//! use tabula_editor::{Editor, Field, Request};
//! use tabula_query::MemoryDatabase;
//!
//! # async fn run() -> tabula_editor::EditorResult<()> {
//! let db = MemoryDatabase::new();
//! let editor = Editor::new("users")
//!     .field(Field::new("first_name"))
//!     .field(Field::new("last_name"));
//!
//! let response = editor.process(&db, &Request::read(), None).await?;
//! println!("{}", response.to_value());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod editor;
pub mod error;
pub mod field;
pub mod hooks;
pub mod join;
pub mod logging;
pub mod options;
pub mod path;
pub mod pkey;
pub mod request;
pub mod response;
pub mod ssp;
pub mod upload;
pub mod validate;

pub use config::{ConfigError, EditorConfig};
pub use editor::{Editor, ReadResult};
pub use error::{EditorError, EditorResult};
pub use field::{Direction, Field, FieldValue, SetMode};
pub use hooks::{last_non_null, Hook, HookEvent, HookPoint, Hooks};
pub use join::{LeftJoin, ManyJoin};
pub use logging::{init_logging, LoggingConfig};
pub use options::{OptionItem, OptionsSource};
pub use path::{Path, PathError};
pub use pkey::PrimaryKey;
pub use request::{Action, Request};
pub use response::{FieldError, Response, UploadResult};
pub use upload::{Upload, UploadOutcome, UploadPayload};
pub use validate::{DatasetValidator, GlobalValidator, ValidationHost, Validator};
