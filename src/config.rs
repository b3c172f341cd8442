//! Transcoder configuration
//!
//! Names the XML schemas a transcode runs against and the root element
//! to walk them from. The XSD parser collaborator consumes the sources;
//! this crate validates the configuration and threads it into the
//! `xmlSchemas` property of generated record schemas.

use std::path::PathBuf;

use url::Url;

use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::record::schema::XmlSchemasProperty;

/// Configuration for one transcoder instance
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    /// Base URI for resolving relative schema locations
    pub base_uri: Option<String>,
    /// In-memory schema sources
    pub sources: Vec<String>,
    /// Schema URLs
    pub schema_urls: Vec<Url>,
    /// Schema files
    pub schema_files: Vec<PathBuf>,
    /// The root element of the transcode
    pub root_tag: QName,
}

/// Builder for [`TranscoderConfig`]
#[derive(Debug, Default)]
pub struct TranscoderConfigBuilder {
    base_uri: Option<String>,
    sources: Vec<String>,
    schema_urls: Vec<Url>,
    schema_files: Vec<PathBuf>,
    root_tag: Option<QName>,
}

impl TranscoderConfig {
    /// Start building a configuration
    pub fn builder() -> TranscoderConfigBuilder {
        TranscoderConfigBuilder::default()
    }

    /// The `xmlSchemas` property equivalent of this configuration
    pub fn to_xml_schemas_property(&self) -> XmlSchemasProperty {
        XmlSchemasProperty {
            base_uri: self.base_uri.clone(),
            urls: self.schema_urls.iter().map(|u| u.to_string()).collect(),
            files: self
                .schema_files
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            root_tag: self.root_tag.clone(),
        }
    }
}

impl TranscoderConfigBuilder {
    /// Set the base URI
    pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    /// Add an in-memory schema source
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// Add a schema URL
    pub fn schema_url(mut self, url: &str) -> Result<Self> {
        self.schema_urls.push(Url::parse(url)?);
        Ok(self)
    }

    /// Add a schema file
    pub fn schema_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_files.push(path.into());
        self
    }

    /// Set the root element
    pub fn root_tag(mut self, root_tag: QName) -> Self {
        self.root_tag = Some(root_tag);
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<TranscoderConfig> {
        let root_tag = self
            .root_tag
            .ok_or_else(|| Error::Config("a root tag is required".to_string()))?;

        if self.sources.is_empty() && self.schema_urls.is_empty() && self.schema_files.is_empty() {
            return Err(Error::Config(
                "at least one schema source, URL, or file is required".to_string(),
            ));
        }

        Ok(TranscoderConfig {
            base_uri: self.base_uri,
            sources: self.sources,
            schema_urls: self.schema_urls,
            schema_files: self.schema_files,
            root_tag,
        })
    }
}
