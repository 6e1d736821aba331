use crate::http::{ApiError, ApiRequest, HttpClient, Upload};
use reqwest::header::{HeaderValue, ACCEPT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Backend REST collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Sites,
    Tenants,
    Equipment,
    Subnets,
    IpAddresses,
    DnsZones,
    DnsRecords,
    Contacts,
    ContactGroups,
    Alerts,
    AlertRules,
    ConfigTemplates,
    ConfigBackups,
}

impl Resource {
    pub const ALL: [Resource; 13] = [
        Resource::Sites,
        Resource::Tenants,
        Resource::Equipment,
        Resource::Subnets,
        Resource::IpAddresses,
        Resource::DnsZones,
        Resource::DnsRecords,
        Resource::Contacts,
        Resource::ContactGroups,
        Resource::Alerts,
        Resource::AlertRules,
        Resource::ConfigTemplates,
        Resource::ConfigBackups,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Sites => "sites",
            Self::Tenants => "tenants",
            Self::Equipment => "equipment",
            Self::Subnets => "subnets",
            Self::IpAddresses => "ip-addresses",
            Self::DnsZones => "dns-zones",
            Self::DnsRecords => "dns-records",
            Self::Contacts => "contacts",
            Self::ContactGroups => "contact-groups",
            Self::Alerts => "alerts",
            Self::AlertRules => "alert-rules",
            Self::ConfigTemplates => "config-templates",
            Self::ConfigBackups => "config-backups",
        }
    }

    /// Collection path, with the trailing slash the backend's router expects.
    pub fn path(self) -> &'static str {
        match self {
            Self::Sites => "/sites/sites/",
            Self::Tenants => "/tenants/tenants/",
            Self::Equipment => "/equipment/equipment/",
            Self::Subnets => "/ipam/subnets/",
            Self::IpAddresses => "/ipam/ip-addresses/",
            Self::DnsZones => "/dns/zones/",
            Self::DnsRecords => "/dns/records/",
            Self::Contacts => "/contacts/contacts/",
            Self::ContactGroups => "/contacts/groups/",
            Self::Alerts => "/alerts/alerts/",
            Self::AlertRules => "/alerts/rules/",
            Self::ConfigTemplates => "/configurations/templates/",
            Self::ConfigBackups => "/configurations/backups/",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Error)]
#[error("unknown resource `{0}`")]
pub struct UnknownResource(String);

impl FromStr for Resource {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|r| r.name() == wanted)
            .ok_or_else(|| UnknownResource(s.to_string()))
    }
}

/// Paginated list envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Some endpoints paginate, some return a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing {
    Paged(Page<Value>),
    Bare(Vec<Value>),
}

impl From<Listing> for Page<Value> {
    fn from(listing: Listing) -> Self {
        match listing {
            Listing::Paged(page) => page,
            Listing::Bare(results) => Page {
                count: Some(results.len() as u64),
                next: None,
                previous: None,
                results,
            },
        }
    }
}

/// Raw payload of a non-JSON route such as a CSV export.
#[derive(Debug, Clone)]
pub struct Download {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

fn segment(value: &str) -> String {
    urlencoding::encode(value.trim().trim_matches('/')).into_owned()
}

pub struct ResourceClient<'a> {
    http: &'a HttpClient,
    resource: Resource,
}

impl<'a> ResourceClient<'a> {
    pub(crate) fn new(http: &'a HttpClient, resource: Resource) -> Self {
        Self { http, resource }
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}{}/", self.resource.path(), segment(id))
    }

    fn with_filters(mut request: ApiRequest, filters: &[(String, String)]) -> ApiRequest {
        for (key, value) in filters {
            request = request.query(key.clone(), value.clone());
        }
        request
    }

    pub async fn page(&self, filters: &[(String, String)]) -> Result<Page<Value>, ApiError> {
        let request = Self::with_filters(ApiRequest::get(self.resource.path()), filters);
        let listing: Listing = self.http.send_json(request).await?;
        Ok(listing.into())
    }

    pub async fn list(&self, filters: &[(String, String)]) -> Result<Vec<Value>, ApiError> {
        Ok(self.page(filters).await?.results)
    }

    pub async fn get(&self, id: &str) -> Result<Value, ApiError> {
        self.http.send_json(ApiRequest::get(self.item_path(id))).await
    }

    pub async fn create(&self, body: Value) -> Result<Value, ApiError> {
        self.http
            .send_json(ApiRequest::post(self.resource.path(), body))
            .await
    }

    /// Partial update.
    pub async fn update(&self, id: &str, body: Value) -> Result<Value, ApiError> {
        self.http
            .send_json(ApiRequest::patch(self.item_path(id), body))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.http.execute(ApiRequest::delete(self.item_path(id))).await?;
        Ok(())
    }

    /// POST to a per-item action, e.g. `acknowledge` on an alert.
    pub async fn action(&self, id: &str, action: &str, body: Value) -> Result<Value, ApiError> {
        let path = format!("{}{}/", self.item_path(id), segment(action));
        self.http.send_json(ApiRequest::post(path, body)).await
    }

    /// GET a per-item route, e.g. `site_stats` on a site.
    pub async fn item_get(
        &self,
        id: &str,
        action: &str,
        filters: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let path = format!("{}{}/", self.item_path(id), segment(action));
        let request = Self::with_filters(ApiRequest::get(path), filters);
        self.http.send_json(request).await
    }

    /// GET a collection-level route, e.g. `stats`.
    pub async fn collection_get(
        &self,
        action: &str,
        filters: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let path = format!("{}{}/", self.resource.path(), segment(action));
        let request = Self::with_filters(ApiRequest::get(path), filters);
        self.http.send_json(request).await
    }

    /// POST to a collection-level route, e.g. `bulk_delete`.
    pub async fn collection_post(&self, action: &str, body: Value) -> Result<Value, ApiError> {
        let path = format!("{}{}/", self.resource.path(), segment(action));
        self.http.send_json(ApiRequest::post(path, body)).await
    }

    /// GET a collection-level route without decoding it, e.g. the CSV
    /// `export`.
    pub async fn collection_download(
        &self,
        action: &str,
        filters: &[(String, String)],
    ) -> Result<Download, ApiError> {
        let path = format!("{}{}/", self.resource.path(), segment(action));
        let request = Self::with_filters(ApiRequest::get(path), filters)
            .header(ACCEPT, HeaderValue::from_static("*/*"));
        let response = self.http.execute(request).await?;
        Ok(Download {
            content_type: response.content_type(),
            bytes: response.body,
        })
    }

    /// POST a file to a collection-level route as `multipart/form-data`,
    /// e.g. `import`.
    pub async fn collection_upload(&self, action: &str, upload: Upload) -> Result<Value, ApiError> {
        let path = format!("{}{}/", self.resource.path(), segment(action));
        self.http.send_json(ApiRequest::multipart(path, upload)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ApiResponse;
    use crate::test_utils::FakeTransport;
    use reqwest::header::CONTENT_TYPE;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn http(transport: Arc<FakeTransport>) -> HttpClient {
        HttpClient::new(transport, Duration::from_secs(5))
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for resource in Resource::ALL {
            assert_eq!(resource.name().parse::<Resource>().unwrap(), resource);
        }
        assert_eq!("IP_ADDRESSES".parse::<Resource>().unwrap(), Resource::IpAddresses);
        assert!("diagrams".parse::<Resource>().is_err());
    }

    #[test]
    fn paths_are_rooted_and_slash_terminated() {
        for resource in Resource::ALL {
            let path = resource.path();
            assert!(path.starts_with('/') && path.ends_with('/'), "{path}");
        }
    }

    #[tokio::test]
    async fn list_accepts_paginated_and_bare_responses() {
        let paged = Arc::new(FakeTransport::ok(json!({
            "count": 2, "next": null, "previous": null,
            "results": [{"id": "s1"}, {"id": "s2"}]
        })));
        let client = http(paged.clone());
        let sites = ResourceClient::new(&client, Resource::Sites);
        let filters = vec![("status".to_string(), "active".to_string())];
        assert_eq!(sites.list(&filters).await.unwrap().len(), 2);
        assert_eq!(paged.requests()[0].path_and_query(), "/sites/sites/?status=active");

        let bare = Arc::new(FakeTransport::ok(json!([{"id": "z1"}])));
        let client = http(bare);
        let page = ResourceClient::new(&client, Resource::DnsZones).page(&[]).await.unwrap();
        assert_eq!(page.count, Some(1));
        assert_eq!(page.results[0]["id"], "z1");
    }

    #[tokio::test]
    async fn item_routes_encode_ids() {
        let transport = Arc::new(FakeTransport::ok(json!({})));
        let client = http(transport.clone());
        let alerts = ResourceClient::new(&client, Resource::Alerts);

        alerts.get("a 1").await.unwrap();
        alerts.update("a1", json!({"severity": "low"})).await.unwrap();
        alerts.action("a1", "acknowledge", json!({})).await.unwrap();
        alerts.delete("a1").await.unwrap();
        ResourceClient::new(&client, Resource::Sites)
            .collection_post("bulk_delete", json!({"ids": ["s1"]}))
            .await
            .unwrap();
        ResourceClient::new(&client, Resource::Sites)
            .collection_get("stats", &[])
            .await
            .unwrap();

        let sent: Vec<_> = transport
            .requests()
            .into_iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect();
        assert_eq!(
            sent,
            [
                "GET /alerts/alerts/a%201/",
                "PATCH /alerts/alerts/a1/",
                "POST /alerts/alerts/a1/acknowledge/",
                "DELETE /alerts/alerts/a1/",
                "POST /sites/sites/bulk_delete/",
                "GET /sites/sites/stats/",
            ]
        );
    }

    #[tokio::test]
    async fn item_get_reads_per_item_routes() {
        let transport = Arc::new(FakeTransport::ok(json!({"equipment_count": 4})));
        let client = http(transport.clone());
        let stats = ResourceClient::new(&client, Resource::Sites)
            .item_get("s1", "site_stats", &[])
            .await
            .unwrap();
        assert_eq!(stats["equipment_count"], 4);

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, reqwest::Method::GET);
        assert_eq!(sent.path, "/sites/sites/s1/site_stats/");
    }

    #[tokio::test]
    async fn export_returns_raw_bytes() {
        let csv = "id,name\ns1,HQ\n";
        let transport = Arc::new(FakeTransport::new(move |_| {
            let mut res = ApiResponse::new(StatusCode::OK, csv);
            res.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"));
            Ok(res)
        }));
        let client = http(transport.clone());
        let filters = vec![("format".to_string(), "csv".to_string())];

        let download = ResourceClient::new(&client, Resource::Sites)
            .collection_download("export", &filters)
            .await
            .unwrap();
        assert_eq!(download.content_type.as_deref(), Some("text/csv"));
        assert_eq!(download.bytes, csv.as_bytes());

        let sent = &transport.requests()[0];
        assert_eq!(sent.path_and_query(), "/sites/sites/export/?format=csv");
        assert_eq!(sent.headers.get(ACCEPT).unwrap(), "*/*");
    }

    #[tokio::test]
    async fn import_posts_the_file_as_multipart() {
        let transport = Arc::new(FakeTransport::ok(json!({"imported": 2, "errors": []})));
        let client = http(transport.clone());

        let result = ResourceClient::new(&client, Resource::Sites)
            .collection_upload("import", Upload::file("sites.csv", "id,name\n"))
            .await
            .unwrap();
        assert_eq!(result["imported"], 2);

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, reqwest::Method::POST);
        assert_eq!(sent.path, "/sites/sites/import/");
        assert!(sent.body.is_none());
        assert_eq!(sent.upload.as_ref().unwrap().file_name, "sites.csv");
    }

    #[tokio::test]
    async fn unexpected_list_shape_is_a_decode_error() {
        let client = http(Arc::new(FakeTransport::ok(json!({"detail": "oops"}))));
        let err = ResourceClient::new(&client, Resource::Tenants).list(&[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
