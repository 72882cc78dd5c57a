//! Path tracking along named axes.
//!
//! Each axis holds an ordered stack of segments describing the current
//! position of one traversal. Name segments are joined with `.`; index
//! segments (`[0]`) are suffixed onto the most recent name segment, so a
//! source position renders as `lines[1].sku`.
//!
//! The mapper keeps two axes, [`SOURCE`] and [`TARGET`], which advance
//! independently: one target field may be found several levels deep in the
//! source.

use std::collections::BTreeMap;

use thiserror::Error;

/// Axis tracking the position inside the source record.
pub const SOURCE: &str = "source";
/// Axis tracking the position inside the target model.
pub const TARGET: &str = "target";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path axis '{0}' already exists")]
    AxisExists(String),

    #[error("unknown path axis '{0}'")]
    UnknownAxis(String),

    #[error("cannot add index {segment} without a preceding segment on the '{axis}' axis")]
    IndexWithoutSegment { axis: String, segment: String },
}

/// Render an index segment (`[3]`).
pub fn index_segment(index: usize) -> String {
    format!("[{}]", index)
}

fn is_index(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('[') && segment.ends_with(']')
}

#[derive(Debug, Clone, Default)]
struct Axis {
    /// Name of the model the axis is rooted at, used for qualified paths.
    root: String,
    segments: Vec<String>,
}

/// Per-call path state for every registered axis.
#[derive(Debug, Clone, Default)]
pub struct PathTracker {
    axes: BTreeMap<String, Axis>,
}

impl PathTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new axis rooted at the model called `root`.
    pub fn create_axis(&mut self, name: &str, root: &str) -> Result<(), PathError> {
        if self.axes.contains_key(name) {
            return Err(PathError::AxisExists(name.to_string()));
        }
        self.axes.insert(
            name.to_string(),
            Axis {
                root: root.to_string(),
                segments: Vec::new(),
            },
        );
        Ok(())
    }

    /// Push a segment. Index segments are suffixed onto the last name segment.
    pub fn push(&mut self, axis: &str, segment: &str) -> Result<(), PathError> {
        let state = self.axis_mut(axis)?;
        if is_index(segment) {
            match state.segments.last_mut() {
                Some(last) => last.push_str(segment),
                None => {
                    return Err(PathError::IndexWithoutSegment {
                        axis: axis.to_string(),
                        segment: segment.to_string(),
                    })
                }
            }
        } else {
            state.segments.push(segment.to_string());
        }
        Ok(())
    }

    /// Undo the matching [`push`](Self::push).
    pub fn pop(&mut self, axis: &str, segment: &str) -> Result<(), PathError> {
        let state = self.axis_mut(axis)?;
        if is_index(segment) {
            if let Some(last) = state.segments.last_mut() {
                if last.ends_with(segment) {
                    last.truncate(last.len() - segment.len());
                }
            }
        } else {
            state.segments.pop();
        }
        Ok(())
    }

    /// Segments of `axis` joined with `.`; empty at the axis root.
    pub fn current_path(&self, axis: &str) -> Result<String, PathError> {
        Ok(self.axis(axis)?.segments.join("."))
    }

    /// The current path prefixed with the axis root model name
    /// (`Order.lines[0].sku`).
    pub fn qualified_path(&self, axis: &str) -> Result<String, PathError> {
        let state = self.axis(axis)?;
        if state.segments.is_empty() {
            Ok(state.root.clone())
        } else {
            Ok(format!("{}.{}", state.root, state.segments.join(".")))
        }
    }

    /// Drop every axis.
    pub fn clear(&mut self) {
        self.axes.clear();
    }

    pub fn axis_names(&self) -> impl Iterator<Item = &str> {
        self.axes.keys().map(String::as_str)
    }

    fn axis(&self, axis: &str) -> Result<&Axis, PathError> {
        self.axes
            .get(axis)
            .ok_or_else(|| PathError::UnknownAxis(axis.to_string()))
    }

    fn axis_mut(&mut self, axis: &str) -> Result<&mut Axis, PathError> {
        self.axes
            .get_mut(axis)
            .ok_or_else(|| PathError::UnknownAxis(axis.to_string()))
    }
}
