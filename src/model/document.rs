use std::fmt;

use bon::bon;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{
    Product, TaxpayerId,
    validation::{self, Validate, ValidationError},
};

/// Envelope posted to the document creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub document: Document,
    /// Detached signature, passed through untouched.
    #[serde(rename = "sign")]
    pub signature: String,
}

impl DocumentRequest {
    pub fn new(document: Document, signature: impl Into<String>) -> Self {
        Self {
            document,
            signature: signature.into(),
        }
    }
}

impl Validate for DocumentRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        self.document.validate()?;
        validation::present("sign", &self.signature)
    }
}

/// Party block of a document. Its single field is camelCase on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    #[serde(rename = "participantInn")]
    pub participant_inn: TaxpayerId,
}

impl Description {
    pub fn new(participant_inn: impl Into<String>) -> Result<Self, ValidationError> {
        Ok(Self {
            participant_inn: TaxpayerId::for_field("participantInn", participant_inn)?,
        })
    }
}

impl Validate for Description {
    fn validate(&self) -> Result<(), ValidationError> {
        // TaxpayerId cannot hold an invalid value.
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    New,
    InProgress,
    Closed,
}

/// Document type. The remote side may add types; unknown ones round-trip as [`DocumentType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentType {
    LpIntroduceGoods,
    Other(String),
}

impl DocumentType {
    pub fn as_str(&self) -> &str {
        match self {
            DocumentType::LpIntroduceGoods => "LP_INTRODUCE_GOODS",
            DocumentType::Other(other) => other,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DocumentType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "LP_INTRODUCE_GOODS" => DocumentType::LpIntroduceGoods,
            _ => DocumentType::Other(value),
        }
    }
}

impl From<DocumentType> for String {
    fn from(value: DocumentType) -> Self {
        match value {
            DocumentType::LpIntroduceGoods => "LP_INTRODUCE_GOODS".to_string(),
            DocumentType::Other(other) => other,
        }
    }
}

/// "Introduce goods into circulation" document.
///
/// Fields are declared in wire order. `importRequest` is the one camelCase
/// name at this level; the remote schema really spells it that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub description: Description,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    pub doc_status: DocumentStatus,
    pub doc_type: DocumentType,
    #[serde(rename = "importRequest", skip_serializing_if = "Option::is_none")]
    pub import_request: Option<bool>,
    pub owner_inn: TaxpayerId,
    pub participant_inn: TaxpayerId,
    pub producer_inn: TaxpayerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<Product>,
    /// Kept as a string so the value is sent exactly as given.
    pub reg_date: String,
    pub reg_number: String,
}

#[bon]
impl Document {
    /// Builds a document, checking every field including the products.
    #[builder]
    pub fn new(
        description: Description,
        doc_status: DocumentStatus,
        doc_type: DocumentType,
        #[builder(into)] owner_inn: String,
        #[builder(into)] participant_inn: String,
        #[builder(into)] producer_inn: String,
        #[builder(into)] reg_date: String,
        #[builder(into)] reg_number: String,
        #[builder(into)] doc_id: Option<String>,
        import_request: Option<bool>,
        production_date: Option<NaiveDate>,
        #[builder(into)] production_type: Option<String>,
        #[builder(default)] products: Vec<Product>,
    ) -> Result<Self, ValidationError> {
        let document = Self {
            description,
            doc_id,
            doc_status,
            doc_type,
            import_request,
            owner_inn: TaxpayerId::for_field("owner_inn", owner_inn)?,
            participant_inn: TaxpayerId::for_field("participant_inn", participant_inn)?,
            producer_inn: TaxpayerId::for_field("producer_inn", producer_inn)?,
            production_date,
            production_type,
            products,
            reg_date,
            reg_number,
        };
        document.validate()?;
        Ok(document)
    }
}

impl Validate for Document {
    fn validate(&self) -> Result<(), ValidationError> {
        self.description.validate()?;
        if let Some(doc_id) = &self.doc_id {
            validation::hyphenated_uuid("doc_id", doc_id)?;
        }
        validation::iso_date("reg_date", &self.reg_date)?;
        validation::present("reg_number", &self.reg_number)?;
        self.products.iter().try_for_each(Validate::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC_ID: &str = "8f6a1c2e-4b7d-4e3a-9c1f-0d2b3a4c5e6f";

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 23).unwrap()
    }

    fn product() -> Product {
        Product::builder()
            .owner_inn("7707083893")
            .producer_inn("7728168971")
            .production_date(date())
            .tnved_code("6401100000")
            .build()
            .unwrap()
    }

    fn document() -> Document {
        Document::builder()
            .description(Description::new("7707083893").unwrap())
            .doc_id(DOC_ID)
            .doc_status(DocumentStatus::New)
            .doc_type(DocumentType::LpIntroduceGoods)
            .import_request(true)
            .owner_inn("7707083893")
            .participant_inn("7707083893")
            .producer_inn("7728168971")
            .production_date(date())
            .production_type("OWN_PRODUCTION")
            .products(vec![product()])
            .reg_date("2020-01-23")
            .reg_number("REG-1")
            .build()
            .unwrap()
    }

    #[test]
    fn envelope_serializes_in_wire_order() {
        let request = DocumentRequest::new(document(), "c2lnbmF0dXJl");
        let json = serde_json::to_string(&request).unwrap();

        let expected = concat!(
            r#"{"document":{"description":{"participantInn":"7707083893"},"#,
            r#""doc_id":"8f6a1c2e-4b7d-4e3a-9c1f-0d2b3a4c5e6f","doc_status":"NEW","#,
            r#""doc_type":"LP_INTRODUCE_GOODS","importRequest":true,"#,
            r#""owner_inn":"7707083893","participant_inn":"7707083893","#,
            r#""producer_inn":"7728168971","production_date":"2020-01-23","#,
            r#""production_type":"OWN_PRODUCTION","products":[{"owner_inn":"7707083893","#,
            r#""producer_inn":"7728168971","production_date":"2020-01-23","#,
            r#""tnved_code":"6401100000"}],"reg_date":"2020-01-23","reg_number":"REG-1"},"#,
            r#""sign":"c2lnbmF0dXJl"}"#,
        );
        assert_eq!(json, expected);
    }

    #[test]
    fn absent_optionals_are_omitted_not_null() {
        let mut doc = document();
        doc.doc_id = None;
        doc.import_request = None;
        doc.production_date = None;
        doc.production_type = None;
        doc.products.clear();

        let json = serde_json::to_string(&DocumentRequest::new(doc, "s")).unwrap();
        assert!(!json.contains("null"), "{json}");
        for key in ["doc_id", "importRequest", "production_date", "production_type", "products"] {
            assert!(!json.contains(key), "{key} should be omitted: {json}");
        }
    }

    #[test]
    fn decoding_ignores_unknown_fields_and_round_trips() {
        let request = DocumentRequest::new(document(), "sig");
        let mut value = serde_json::to_value(&request).unwrap();
        value["document"]["unexpected"] = serde_json::json!({"nested": 1});
        value["extra"] = serde_json::json!(true);

        let decoded: DocumentRequest = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(
            serde_json::to_string(&decoded).unwrap(),
            serde_json::to_string(&request).unwrap()
        );
    }

    #[test]
    fn unknown_document_type_round_trips() {
        let mut doc = document();
        doc.doc_type = DocumentType::from("LP_SHIP_GOODS".to_string());
        assert_eq!(doc.doc_type, DocumentType::Other("LP_SHIP_GOODS".to_string()));

        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains(r#""doc_type":"LP_SHIP_GOODS""#));
        let decoded: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.doc_type.as_str(), "LP_SHIP_GOODS");
    }

    #[test]
    fn statuses_use_screaming_snake_case() {
        assert_eq!(serde_json::to_string(&DocumentStatus::InProgress).unwrap(), "\"IN_PROGRESS\"");
        assert_eq!(
            serde_json::from_str::<DocumentStatus>("\"CLOSED\"").unwrap(),
            DocumentStatus::Closed
        );
        assert!(serde_json::from_str::<DocumentStatus>("\"OPEN\"").is_err());
    }

    #[test]
    fn builder_rejects_invalid_owner_inn() {
        let err = Document::builder()
            .description(Description::new("7707083893").unwrap())
            .doc_status(DocumentStatus::New)
            .doc_type(DocumentType::LpIntroduceGoods)
            .owner_inn("123")
            .participant_inn("7707083893")
            .producer_inn("7707083893")
            .reg_date("2020-01-23")
            .reg_number("REG-1")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidInn {
                field: "owner_inn",
                value: "123".to_string()
            }
        );
    }

    #[test]
    fn builder_rejects_malformed_doc_id_and_reg_date() {
        let base = || {
            Document::builder()
                .description(Description::new("7707083893").unwrap())
                .doc_status(DocumentStatus::Closed)
                .doc_type(DocumentType::LpIntroduceGoods)
                .owner_inn("7707083893")
                .participant_inn("7707083893")
                .producer_inn("7707083893")
                .reg_number("REG-1")
        };

        assert!(matches!(
            base().doc_id("42").reg_date("2020-01-23").build(),
            Err(ValidationError::InvalidUuid { field: "doc_id", .. })
        ));
        assert!(matches!(
            base().reg_date("2020/01/23").build(),
            Err(ValidationError::InvalidDate { field: "reg_date", .. })
        ));
        assert!(base().reg_date("2020-01-23").build().is_ok());
    }

    #[test]
    fn description_reports_camel_case_field() {
        assert!(matches!(
            Description::new("12"),
            Err(ValidationError::InvalidInn { field: "participantInn", .. })
        ));
    }

    #[test]
    fn request_requires_signature_and_valid_products() {
        assert_eq!(
            DocumentRequest::new(document(), "").validate(),
            Err(ValidationError::Missing { field: "sign" })
        );

        let mut doc = document();
        doc.products[0].tnved_code = Some("12".to_string());
        assert!(DocumentRequest::new(doc, "sig").validate().is_err());
    }

    #[test]
    fn decoding_rejects_bad_inn() {
        let mut value = serde_json::to_value(document()).unwrap();
        value["owner_inn"] = serde_json::json!("123");
        assert!(serde_json::from_value::<Document>(value).is_err());
    }
}
