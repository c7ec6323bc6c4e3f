//! eLandings SOAP client.
//!
//! Talks to the ReportManagementService with hand-built SOAP 1.1
//! envelopes over reqwest — the service predates WSDL tooling worth
//! using, and every operation is just positional `<argN>` string
//! arguments with the caller's user, password, and schema version as
//! the first three.
//!
//! Responses wrap their payload in a `<return>` element as HTML-escaped
//! XML, so extraction unescapes twice: once as a side effect of XML text
//! parsing and once more for the service's own escaping pass.
//!
//! The sync engine consumes the [`ReportService`] trait rather than the
//! concrete client, which keeps it testable without a network.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::config::{Credentials, ServiceConfig};

/// Target namespace for all ReportManagementService operations.
const TARGET_NS: &str = "http://webservices.er.psmfc.org/";

/// Search filters for `findUserLandingReports_001`.
///
/// All fields are optional; an empty string means "no filter". Dates are
/// ISO `YYYY-MM-DDTHH:MM:SS` strings. The field order here mirrors the
/// positional argument order the operation expects.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub operation_id: String,
    pub report_type: String,
    pub report_status: String,
    pub adfg_number: String,
    pub cfec_file: String,
    pub uscg_doc: String,
    pub state_reg: String,
    pub cfec_permit: String,
    pub ifq_permit: String,
    pub ifq_batch_confirmation: String,
    pub tender_vessel: String,
    pub processor_number: String,
    pub federal_processor: String,
    pub registered_buyer: String,
    pub landing_report_number: String,
    pub landing_report_short_id: String,
    pub fish_ticket: String,
    pub date_landed_start: String,
    pub date_landed_end: String,
    pub date_created_start: String,
    pub date_created_end: String,
    pub date_modified_start: String,
    pub date_modified_end: String,
}

/// The remote report service as the sync engine sees it.
///
/// Both calls return `Ok(None)` for a blank or absent `<return>` payload,
/// which callers treat differently from a transport or parse error.
#[async_trait]
pub trait ReportService: Send + Sync {
    /// Search for landing reports matching the filters. Returns the raw
    /// (unescaped) result XML or `None` when the service sent nothing.
    async fn find_landing_reports(&self, filters: &SearchFilters) -> Result<Option<String>>;

    /// Fetch one full landing report by id. `None` when the report does
    /// not exist or the caller is not authorized to read it.
    async fn get_landing_report(&self, report_id: &str) -> Result<Option<String>>;
}

/// Concrete SOAP client for the eLandings ReportManagementService.
pub struct ElandingsClient {
    endpoint: String,
    credentials: Credentials,
    schema_version: String,
    http: reqwest::Client,
}

impl ElandingsClient {
    /// Build a client from service configuration, resolving credentials
    /// from the config file or environment.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let credentials = config.credentials()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            credentials,
            schema_version: config.schema_version.clone(),
            http,
        })
    }

    /// List the caller's operations (fishing businesses). Used by the
    /// `landings operations` command to discover `--operation` ids.
    pub async fn get_operations(&self) -> Result<Option<String>> {
        self.call_and_extract("getOperations", &self.identity_args())
            .await
    }

    fn identity_args(&self) -> Vec<String> {
        vec![
            self.credentials.user.clone(),
            self.credentials.password.clone(),
            self.schema_version.clone(),
        ]
    }

    async fn call_and_extract(&self, operation: &str, args: &[String]) -> Result<Option<String>> {
        let envelope = build_envelope(operation, args);
        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", "")
            .header("Accept", "application/xml,text/xml,*/*")
            .body(envelope)
            .send()
            .await
            .with_context(|| format!("SOAP call {} failed", operation))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!(
                "SOAP call {} failed (HTTP {}): {}",
                operation,
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        let body = response.text().await?;
        extract_return(&body, &format!("{}Response", operation))
    }
}

#[async_trait]
impl ReportService for ElandingsClient {
    async fn find_landing_reports(&self, filters: &SearchFilters) -> Result<Option<String>> {
        let mut args = self.identity_args();
        args.extend(
            [
                &filters.operation_id,
                &filters.report_type,
                &filters.report_status,
                &filters.adfg_number,
                &filters.cfec_file,
                &filters.uscg_doc,
                &filters.state_reg,
                &filters.cfec_permit,
                &filters.ifq_permit,
                &filters.ifq_batch_confirmation,
                &filters.tender_vessel,
                &filters.processor_number,
                &filters.federal_processor,
                &filters.registered_buyer,
                &filters.landing_report_number,
                &filters.landing_report_short_id,
                &filters.fish_ticket,
                &filters.date_landed_start,
                &filters.date_landed_end,
                &filters.date_created_start,
                &filters.date_created_end,
                &filters.date_modified_start,
                &filters.date_modified_end,
            ]
            .into_iter()
            .cloned(),
        );
        self.call_and_extract("findUserLandingReports_001", &args)
            .await
    }

    async fn get_landing_report(&self, report_id: &str) -> Result<Option<String>> {
        let mut args = self.identity_args();
        args.push(report_id.to_string());
        // Trailing blank arg: the operation takes an unused fifth parameter.
        args.push(String::new());
        self.call_and_extract("getLandingReport", &args).await
    }
}

/// Build a SOAP 1.1 envelope with positional `<argN>` arguments.
fn build_envelope(operation: &str, args: &[String]) -> String {
    let mut body = String::new();
    for (i, arg) in args.iter().enumerate() {
        body.push_str(&format!("      <arg{i}>{}</arg{i}>\n", escape(arg.as_str())));
    }
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"
                  xmlns:tns="{TARGET_NS}">
  <soapenv:Header/>
  <soapenv:Body>
    <tns:{operation}>
{body}    </tns:{operation}>
  </soapenv:Body>
</soapenv:Envelope>"#
    )
}

/// Pull the `<return>` payload out of a SOAP response envelope.
///
/// Matches the response element by local name (the service varies its
/// namespace prefix), then collects the text of the `return` child and
/// applies the second unescape pass. A missing or whitespace-only
/// payload is `None`; a body that is not XML at all is an error.
fn extract_return(xml: &str, response_tag: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    let mut in_response = false;
    let mut in_return = false;
    let mut payload = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if local == response_tag {
                    in_response = true;
                } else if in_response && local == "return" {
                    in_return = true;
                }
            }
            Ok(Event::Text(t)) if in_return => payload.push_str(&t.unescape()?),
            Ok(Event::CData(c)) if in_return => {
                payload.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::End(e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if local == "return" {
                    in_return = false;
                } else if local == response_tag {
                    in_response = false;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => bail!("malformed SOAP response: {}", e),
        }
    }

    if payload.trim().is_empty() {
        return Ok(None);
    }

    // Second unescape: the service HTML-escapes the payload it puts in
    // <return>, on top of normal XML escaping.
    let payload = match unescape(&payload) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => payload,
    };
    Ok(Some(payload))
}
