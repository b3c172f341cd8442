//! Limits and constraints for transcoding
//!
//! This module defines limits that bound the path finder's search and the
//! document structures it builds, protecting against pathological schemas
//! (deep recursion, exploding ambiguity) and malformed documents.

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum element nesting depth in a document
    pub max_document_depth: usize,

    /// Maximum number of group transitions explored for one start-tag
    pub max_search_depth: usize,

    /// Maximum number of admissible candidate paths per start-tag
    pub max_candidates: usize,

    /// Maximum number of live checkpoints during one parse
    pub max_checkpoints: usize,

    /// Maximum number of buffered events awaiting a live checkpoint
    pub max_buffered_events: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_document_depth: 1000,
            max_search_depth: 256,
            max_candidates: 64,
            max_checkpoints: 1024,
            max_buffered_events: 1 << 20,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_document_depth: 100,
            max_search_depth: 64,
            max_candidates: 16,
            max_checkpoints: 64,
            max_buffered_events: 1 << 14,
        }
    }

    /// Check if document depth is within limits
    pub fn check_document_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_document_depth {
            Err(Error::LimitExceeded(format!(
                "document depth {} exceeds maximum {}",
                depth, self.max_document_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if search depth is within limits
    pub fn check_search_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_search_depth {
            Err(Error::LimitExceeded(format!(
                "path search depth {} exceeds maximum {}",
                depth, self.max_search_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the candidate count is within limits
    pub fn check_candidates(&self, count: usize) -> Result<()> {
        if count > self.max_candidates {
            Err(Error::LimitExceeded(format!(
                "candidate path count {} exceeds maximum {}",
                count, self.max_candidates
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the checkpoint count is within limits
    pub fn check_checkpoints(&self, count: usize) -> Result<()> {
        if count > self.max_checkpoints {
            Err(Error::LimitExceeded(format!(
                "checkpoint count {} exceeds maximum {}",
                count, self.max_checkpoints
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the buffered event count is within limits
    pub fn check_buffered_events(&self, count: usize) -> Result<()> {
        if count > self.max_buffered_events {
            Err(Error::LimitExceeded(format!(
                "buffered event count {} exceeds maximum {}",
                count, self.max_buffered_events
            )))
        } else {
            Ok(())
        }
    }
}
