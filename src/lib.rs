//! garment-mockup: design engine for custom garment mockups
//!
//! This crate keeps a per-view design (front, back, left, right) of logos,
//! memes, icons and text placed over a tinted garment, with undo history, and
//! exports the whole design as a ZIP of rendered mockups plus the original
//! assets.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use garment_mockup::{
//!     DefaultFetcher, Designer, DesignerConfig, GarmentColor, MemorySurface, View,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DesignerConfig::default();
//! let fetcher = Arc::new(DefaultFetcher::new().with_asset_root("public"));
//! let mut designer = Designer::attach(MemorySurface::new(&config), config, fetcher).await;
//!
//! designer.add_text("Lobster").await;
//! designer.set_fill("#ffcc00")?;
//! designer.set_garment_color(GarmentColor::parse("#1e3a8a")?).await;
//!
//! designer.switch_view(View::Back).await;
//! designer.add_icon(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24">
//!     <path d="M12 2l3 7h7l-6 4 2 7-6-4-6 4 2-7-6-4h7z"/></svg>"#)?;
//!
//! // Later edits do not affect a job that has already begun.
//! let job = designer.begin_export();
//! let archive = job.run().await?;
//! archive.save_in(".")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Design documents
//!
//! [`DesignState`] is the serializable form of a whole design and can be
//! saved and reopened with [`Designer::open`]:
//!
//! ```
//! use garment_mockup::{DesignState, GarmentColor, View};
//!
//! let state = DesignState::from_json(r##"{ "garmentColor": "#ff0000", "activeView": "back" }"##).unwrap();
//! assert_eq!(state.garment_color, GarmentColor::new(255, 0, 0));
//! assert_eq!(state.active_view, View::Back);
//! assert!(state.records(View::Front).is_empty());
//! ```

mod color;
mod config;
mod designer;
mod error;
mod export;
pub mod fetch;
mod fonts;
mod garment;
mod geometry;
mod history;
pub mod raster;
pub mod scene;
mod store;
mod surface;
mod view;

#[cfg(test)]
mod testing;

pub use color::GarmentColor;
pub use config::{CanvasConfig, DesignerConfig, FontConfig, GarmentConfig, PlacementConfig};
pub use designer::{Alignment, Designer};
pub use error::{CodecError, DesignError, ExportError, FetchError};
pub use export::{CollectedAssets, ExportArchive, ExportCompositor, ExportJob, StagedFile, asset_plan, build_archive};
pub use fetch::{AssetFetcher, DefaultFetcher, FetchedAsset, MemoryFetcher};
pub use fonts::{FontBook, FontStatus, TextLayout};
pub use garment::{GarmentBackground, GarmentRenderer, apply_filter, apply_tint};
pub use geometry::{RectPx, SizePx};
pub use history::{HistoryManager, HistorySnapshot};
pub use scene::{ObjectId, ObjectKind, SceneObject};
pub use store::{DesignEvent, DesignState, DesignStateStore, ViewState};
pub use surface::{DrawingSurface, MemorySurface, MutationKind, SurfaceEvent, replace_user_objects};
pub use view::View;
