//! dalclient - KDDart DAL client
//!
//! Re-exports the protocol layer ([`dal_protocol`]) and the session client
//! ([`dal_client`]).
//!
//! ```no_run
//! use dalclient::{Client, ClientConfig, Keyword};
//!
//! # async fn run() -> Result<(), dalclient::ClientError> {
//! let mut client = Client::new(ClientConfig::new("http://kddart.example.org/dal"))?;
//! client.login("admin", "kddart").await?;
//!
//! let response = client
//!     .prepare_query("list/genus/_nperpage/page/_num")
//!     .bind("nperpage", 50)
//!     .bind("num", 1)
//!     .clause(Keyword::Filtering, "GenusName LIKE 'Z%'")
//!     .execute()
//!     .await?;
//! for genus in response.collect_records(&["Genus"], false)?.records("Genus") {
//!     println!("{:?}", genus.get("GenusName"));
//! }
//!
//! client.logout().await;
//! # Ok(())
//! # }
//! ```

pub use dal_client::{
    Client, ClientConfig, ClientError, ErrorCategory, ExportPoll, Session, SessionState,
    UploadSource,
};
pub use dal_protocol::{
    CommandBuilder, CsvOptions, Keyword, Pagination, Permission, ProtocolError, Record,
    RecordVisitor, RequestSigner, Response, ResponseType, SessionExpiry,
};

pub use dal_client as client;
pub use dal_protocol as protocol;
