//! Request shapes for ingesting documents into a knowledge base.
//!
//! These only build the payload; sending it is left to the caller's SDK.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    pub content: DocumentContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dataSourceType")]
pub enum DocumentContent {
    #[serde(rename = "CUSTOM")]
    Custom { custom: CustomDocument },
    #[serde(rename = "S3")]
    S3 { s3: S3Document },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDocument {
    pub custom_document_identifier: DocumentIdentifier,
    pub source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_content: Option<InlineContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_location: Option<S3Uri>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentIdentifier {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    InLine,
    S3Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InlineContent {
    #[serde(rename = "TEXT")]
    Text {
        #[serde(rename = "textContent")]
        text_content: TextContent,
    },
    #[serde(rename = "BYTE")]
    Byte {
        #[serde(rename = "byteContent")]
        byte_content: ByteContent,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteContent {
    /// Base64 payload.
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Document {
    pub s3_location: S3Uri,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Uri {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DocumentMetadata {
    #[serde(rename = "IN_LINE_ATTRIBUTE")]
    InlineAttributes {
        #[serde(rename = "inlineAttributes")]
        inline_attributes: Vec<Value>,
    },
    #[serde(rename = "S3_LOCATION")]
    S3Location {
        #[serde(rename = "s3Location")]
        s3_location: MetadataLocation,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataLocation {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_owner_account_id: Option<String>,
}

impl DocumentConfig {
    fn custom(id: impl Into<String>, source_type: SourceType) -> CustomDocument {
        CustomDocument {
            custom_document_identifier: DocumentIdentifier { id: id.into() },
            source_type,
            inline_content: None,
            s3_location: None,
        }
    }

    fn from_content(content: DocumentContent) -> Self {
        Self {
            content,
            metadata: None,
        }
    }

    pub fn custom_inline_text(id: impl Into<String>, data: impl Into<String>) -> Self {
        let mut custom = Self::custom(id, SourceType::InLine);
        custom.inline_content = Some(InlineContent::Text {
            text_content: TextContent { data: data.into() },
        });
        Self::from_content(DocumentContent::Custom { custom })
    }

    pub fn custom_inline_bytes(
        id: impl Into<String>,
        data: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        let mut custom = Self::custom(id, SourceType::InLine);
        custom.inline_content = Some(InlineContent::Byte {
            byte_content: ByteContent {
                data: data.into(),
                mime_type: mime_type.into(),
            },
        });
        Self::from_content(DocumentContent::Custom { custom })
    }

    pub fn custom_s3(id: impl Into<String>, uri: impl Into<String>) -> Self {
        let mut custom = Self::custom(id, SourceType::S3Location);
        custom.s3_location = Some(S3Uri { uri: uri.into() });
        Self::from_content(DocumentContent::Custom { custom })
    }

    pub fn s3(uri: impl Into<String>) -> Self {
        Self::from_content(DocumentContent::S3 {
            s3: S3Document {
                s3_location: S3Uri { uri: uri.into() },
            },
        })
    }

    /// Attach inline attributes. An empty list leaves metadata unset.
    pub fn with_inline_attributes(mut self, attributes: Vec<Value>) -> Self {
        if !attributes.is_empty() {
            self.metadata = Some(DocumentMetadata::InlineAttributes {
                inline_attributes: attributes,
            });
        }
        self
    }

    pub fn with_metadata_location(
        mut self,
        uri: impl Into<String>,
        bucket_owner_account_id: Option<String>,
    ) -> Self {
        self.metadata = Some(DocumentMetadata::S3Location {
            s3_location: MetadataLocation {
                uri: uri.into(),
                bucket_owner_account_id,
            },
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub knowledge_base_id: String,
    pub data_source_id: String,
    pub documents: Vec<DocumentConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

impl IngestRequest {
    pub fn new(
        knowledge_base_id: impl Into<String>,
        data_source_id: impl Into<String>,
        documents: Vec<DocumentConfig>,
    ) -> Self {
        Self {
            knowledge_base_id: knowledge_base_id.into(),
            data_source_id: data_source_id.into(),
            documents,
            client_token: None,
        }
    }

    pub fn with_client_token(mut self, token: impl Into<String>) -> Self {
        self.client_token = Some(token.into());
        self
    }
}
