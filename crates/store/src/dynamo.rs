use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::scan::builders::ScanFluentBuilder;
use aws_sdk_dynamodb::operation::scan::{ScanError, ScanOutput};
use aws_sdk_dynamodb::types::{AttributeValue as SdkAttributeValue, Select};
use snowdex_contracts::{AttributeValue, Document, FilterCriterion};

use crate::{DocumentStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamoStoreConfig {
    pub region: String,
    pub endpoint_url: Option<String>,
    /// Follow `LastEvaluatedKey` instead of stopping at the first scan page.
    pub follow_pages: bool,
}

#[derive(Clone)]
pub struct DynamoDocumentStore {
    client: aws_sdk_dynamodb::Client,
    follow_pages: bool,
}

impl DynamoDocumentStore {
    pub async fn connect(config: &DynamoStoreConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(endpoint_url) = config.endpoint_url.as_deref() {
            loader = loader.endpoint_url(endpoint_url);
        }
        let sdk_config = loader.load().await;

        Self::from_client(aws_sdk_dynamodb::Client::new(&sdk_config), config.follow_pages)
    }

    pub fn from_client(client: aws_sdk_dynamodb::Client, follow_pages: bool) -> Self {
        Self {
            client,
            follow_pages,
        }
    }

    pub fn client(&self) -> &aws_sdk_dynamodb::Client {
        &self.client
    }

    async fn scan_pages<F>(&self, table: &str, build: F) -> Result<Vec<ScanOutput>, StoreError>
    where
        F: Fn() -> ScanFluentBuilder + Send + Sync,
    {
        let mut pages = Vec::new();
        let mut start_key: Option<HashMap<String, SdkAttributeValue>> = None;

        loop {
            let output = build()
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(backend_error)?;

            let next_key = output
                .last_evaluated_key
                .clone()
                .filter(|key| !key.is_empty());
            pages.push(output);

            match next_key {
                Some(key) if self.follow_pages => start_key = Some(key),
                Some(_) => {
                    tracing::debug!(table, "scan stopped at first page; more items remain");
                    break;
                }
                None => break,
            }
        }

        Ok(pages)
    }
}

#[async_trait]
impl DocumentStore for DynamoDocumentStore {
    async fn scan_count(&self, table: &str) -> Result<u64, StoreError> {
        let pages = self
            .scan_pages(table, || {
                self.client.scan().table_name(table).select(Select::Count)
            })
            .await?;

        Ok(pages
            .iter()
            .map(|page| u64::try_from(page.count).unwrap_or(0))
            .sum())
    }

    async fn scan_all(&self, table: &str) -> Result<Vec<Document>, StoreError> {
        let pages = self
            .scan_pages(table, || self.client.scan().table_name(table))
            .await?;
        documents_from_pages(pages)
    }

    async fn scan_filtered(
        &self,
        table: &str,
        filter: &FilterCriterion,
    ) -> Result<Vec<Document>, StoreError> {
        let pages = self
            .scan_pages(table, || {
                self.client
                    .scan()
                    .table_name(table)
                    .filter_expression("attribute_exists(#attr.#key)")
                    .expression_attribute_names("#attr", filter.attribute_path.as_str())
                    .expression_attribute_names("#key", filter.key.as_str())
            })
            .await?;
        documents_from_pages(pages)
    }
}

fn backend_error(err: SdkError<ScanError, HttpResponse>) -> StoreError {
    StoreError::Backend(DisplayErrorContext(&err).to_string())
}

fn documents_from_pages(pages: Vec<ScanOutput>) -> Result<Vec<Document>, StoreError> {
    pages
        .into_iter()
        .flat_map(|page| page.items.unwrap_or_default())
        .map(document_from_item)
        .collect()
}

pub(crate) fn document_from_item(
    item: HashMap<String, SdkAttributeValue>,
) -> Result<Document, StoreError> {
    item.into_iter()
        .map(|(name, value)| attribute_from_sdk(value).map(|value| (name, value)))
        .collect()
}

pub(crate) fn attribute_from_sdk(value: SdkAttributeValue) -> Result<AttributeValue, StoreError> {
    Ok(match value {
        SdkAttributeValue::S(v) => AttributeValue::S(v),
        SdkAttributeValue::N(v) => AttributeValue::N(v),
        SdkAttributeValue::B(blob) => AttributeValue::B(blob.into_inner()),
        SdkAttributeValue::Bool(v) => AttributeValue::Bool(v),
        SdkAttributeValue::Null(v) => AttributeValue::Null(v),
        SdkAttributeValue::M(map) => AttributeValue::M(
            map.into_iter()
                .map(|(k, v)| attribute_from_sdk(v).map(|v| (k, v)))
                .collect::<Result<BTreeMap<_, _>, _>>()?,
        ),
        SdkAttributeValue::L(values) => AttributeValue::L(
            values
                .into_iter()
                .map(attribute_from_sdk)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        SdkAttributeValue::Ss(values) => AttributeValue::Ss(values),
        SdkAttributeValue::Ns(values) => AttributeValue::Ns(values),
        SdkAttributeValue::Bs(values) => {
            AttributeValue::Bs(values.into_iter().map(|blob| blob.into_inner()).collect())
        }
        other => {
            return Err(StoreError::Decode(format!(
                "unsupported attribute value variant {:?}",
                other
            )));
        }
    })
}
