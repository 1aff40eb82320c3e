use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::records::{
    Attachment, BomLine, BomLineId, Company, CompanyId, Listing, ManufacturerPart, NewBomLine,
    Parameter, Part, PartId, SupplierPart,
};
use crate::{CatalogError, CatalogGateway};

const TIMEOUT: Duration = Duration::from_secs(60);

/// Login for one catalog server, as stored in the user configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub id: String,
    pub domain: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// An authenticated InvenTree session.
pub struct InvenTreeClient {
    client: Client,
    domain: String,
    token: String,
}

impl InvenTreeClient {
    /// Authenticate against the server and keep the API token for this session.
    pub fn connect(credentials: &Credentials) -> Result<Self, CatalogError> {
        let domain = credentials.domain.trim_end_matches('/').to_string();
        let unavailable = |reason: String| CatalogError::Unavailable {
            domain: domain.clone(),
            reason,
        };

        log::debug!(
            "Connecting to InvenTree @ {domain}, username: {}",
            credentials.username
        );

        let client = Client::builder()
            .timeout(TIMEOUT)
            .user_agent(concat!("kitree/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| unavailable(e.to_string()))?;

        let response = client
            .get(format!("{domain}/api/user/token/"))
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .map_err(|e| unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(format!(
                "authentication failed ({})",
                response.status()
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .map_err(|e| unavailable(format!("invalid token response: {e}")))?
            .token;

        Ok(Self {
            client,
            domain,
            token,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.domain, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("Token {}", self.token))
    }

    fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, CatalogError> {
        let response = self
            .authorized(request)
            .send()
            .map_err(|source| CatalogError::Transport {
                url: url.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(CatalogError::not_found(url)),
            status => Err(CatalogError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let url = self.api_url(path);
        log::debug!("Requesting API at {url} {query:?}");
        let body = self
            .send(self.client.get(&url).query(query), &url)?
            .text()
            .map_err(|source| CatalogError::Transport {
                url: url.clone(),
                source,
            })?;
        serde_json::from_str(&body).map_err(|source| CatalogError::Decode { url, source })
    }

    fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, CatalogError> {
        Ok(self.get_json::<Listing<T>>(path, query)?.into_vec())
    }
}

impl CatalogGateway for InvenTreeClient {
    fn base_url(&self) -> &str {
        &self.domain
    }

    fn part_by_ipn(&self, ipn: &str) -> Result<Part, CatalogError> {
        let mut parts: Vec<Part> = self.get_list("part/", &[("IPN", ipn), ("active", "true")])?;
        match parts.len() {
            0 => Err(CatalogError::not_found(format!("active part {ipn}"))),
            1 => Ok(parts.remove(0)),
            count => Err(CatalogError::Ambiguous {
                ipn: ipn.to_string(),
                count,
            }),
        }
    }

    fn part_by_id(&self, id: PartId) -> Result<Part, CatalogError> {
        self.get_json(&format!("part/{id}/"), &[])
    }

    fn attachments(&self, part: PartId) -> Result<Vec<Attachment>, CatalogError> {
        self.get_list("part/attachment/", &[("part", part.to_string().as_str())])
    }

    fn parameters(&self, part: PartId) -> Result<Vec<Parameter>, CatalogError> {
        self.get_list("part/parameter/", &[("part", part.to_string().as_str())])
    }

    fn bom(&self, part: PartId) -> Result<Vec<BomLine>, CatalogError> {
        self.get_list("bom/", &[("part", part.to_string().as_str())])
    }

    fn manufacturer_parts(&self, part: PartId) -> Result<Vec<ManufacturerPart>, CatalogError> {
        self.get_list("company/part/manufacturer/", &[("part", part.to_string().as_str())])
    }

    fn supplier_parts(&self, mpn: &str) -> Result<Vec<SupplierPart>, CatalogError> {
        self.get_list("company/part/", &[("search", mpn)])
    }

    fn company(&self, id: CompanyId) -> Result<Company, CatalogError> {
        self.get_json(&format!("company/{id}/"), &[])
    }

    fn create_bom_line(
        &self,
        master: PartId,
        sub_part: PartId,
        quantity: f64,
        reference: &str,
    ) -> Result<(), CatalogError> {
        let url = self.api_url("bom/");
        let body = NewBomLine {
            part: master,
            sub_part,
            quantity,
            reference: reference.to_string(),
        };
        log::debug!("Adding {quantity}x part {sub_part} to BOM of part {master}");
        self.send(self.client.post(&url).json(&body), &url)?;
        Ok(())
    }

    fn delete_bom_line(&self, id: BomLineId) -> Result<(), CatalogError> {
        let url = self.api_url(&format!("bom/{id}/"));
        log::debug!("Deleting BOM line {id}");
        self.send(self.client.delete(&url), &url)?;
        Ok(())
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        log::debug!("Downloading {url}");
        let request = self.client.get(url);
        // Only our own server gets to see the token.
        let response = if url.starts_with(&self.domain) {
            self.send(request, url)?
        } else {
            let response = request.send().map_err(|source| CatalogError::Transport {
                url: url.to_string(),
                source,
            })?;
            if !response.status().is_success() {
                return Err(CatalogError::Http {
                    status: response.status().as_u16(),
                    url: url.to_string(),
                });
            }
            response
        };
        let bytes = response.bytes().map_err(|source| CatalogError::Transport {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}
