//! Frame index -> image source resolution.

use super::ImageSource;
use crate::error::{ScrollFrameError, ScrollFrameResult};
use smol::future::{BoxedLocal, FutureExt};
use std::future::Future;
use std::rc::Rc;

/// Caller-supplied `index -> source` callback.
///
/// `Ok(ImageSource::Absent)` skips the frame; `Err(_)` is a contract violation
/// and fails the enclosing batch.
pub type FrameFactory = Rc<dyn Fn(usize) -> BoxedLocal<anyhow::Result<ImageSource>>>;

/// Where frame sources come from: a fixed list or a factory over `0..total`.
#[derive(Clone)]
pub enum SourceProvider {
    List(Rc<[ImageSource]>),
    Factory { total: usize, factory: FrameFactory },
}

impl SourceProvider {
    pub fn from_list(images: Vec<ImageSource>) -> Self {
        Self::List(images.into())
    }

    pub fn from_factory<F, Fut>(total: usize, factory: F) -> Self
    where
        F: Fn(usize) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<ImageSource>> + 'static,
    {
        let factory: FrameFactory = Rc::new(move |index| factory(index).boxed_local());
        Self::Factory { total, factory }
    }

    /// Declared frame count.
    pub fn total(&self) -> usize {
        match self {
            Self::List(images) => images.len(),
            Self::Factory { total, .. } => *total,
        }
    }

    pub async fn resolve(&self, index: usize) -> ScrollFrameResult<ImageSource> {
        match self {
            Self::List(images) => images.get(index).cloned().ok_or_else(|| {
                ScrollFrameError::resolution(
                    index,
                    format!("no image at index {} (list has {})", index, images.len()),
                )
            }),
            Self::Factory { total, factory } => {
                if index >= *total {
                    return Err(ScrollFrameError::resolution(
                        index,
                        format!("index out of declared total {}", total),
                    ));
                }
                factory(index).await.map_err(|err| {
                    ScrollFrameError::resolution(index, format!("image factory failed: {:#}", err))
                })
            }
        }
    }
}

impl std::fmt::Debug for SourceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::List(images) => f.debug_tuple("List").field(&images.len()).finish(),
            Self::Factory { total, .. } => f.debug_struct("Factory").field("total", total).finish(),
        }
    }
}
