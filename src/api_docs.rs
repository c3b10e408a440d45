//! The OpenAPI description of the JSON API and a Swagger UI page for browsing it.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde_json::{Value, json};

use crate::endpoints;

const SWAGGER_UI_VERSION: &str = "5.17.14";

/// Build the OpenAPI 3.0 document for the `/api` routes.
pub fn openapi_document() -> Value {
    let transaction_id_body = json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/TransactionIdRequest" }
            }
        }
    });

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Commission Ledger API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Create pending transactions, then cancel, confirm or check them. \
                Pending transactions that are not settled in time expire.",
        },
        "paths": {
            (endpoints::CREATE_TRANSACTION): {
                "post": {
                    "summary": "Create a pending transaction",
                    "description": "The commission is the amount times the user's \
                        commission rate at the time of creation.",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/CreateTransactionRequest" }
                            }
                        }
                    },
                    "responses": {
                        "201": json_response(
                            "The transaction was created",
                            "CreateTransactionResponse",
                        ),
                        "400": error_response("The body is malformed or the amount is not positive"),
                        "404": error_response("The user does not exist"),
                    }
                }
            },
            (endpoints::CANCEL_TRANSACTION): {
                "post": {
                    "summary": "Cancel a pending transaction",
                    "description": "Canceling a canceled, confirmed or expired transaction \
                        changes nothing and returns its current status.",
                    "requestBody": transaction_id_body,
                    "responses": {
                        "200": json_response("The status after the request", "StatusResponse"),
                        "400": error_response("The body is malformed"),
                        "404": error_response("The transaction does not exist"),
                    }
                }
            },
            (endpoints::CONFIRM_TRANSACTION): {
                "post": {
                    "summary": "Confirm a pending transaction",
                    "description": "Confirming a confirmed transaction changes nothing.",
                    "requestBody": transaction_id_body,
                    "responses": {
                        "200": json_response("The status after the request", "StatusResponse"),
                        "400": error_response("The body is malformed"),
                        "404": error_response("The transaction does not exist"),
                        "409": error_response("The transaction was canceled or has expired"),
                    }
                }
            },
            (endpoints::CHECK_TRANSACTION): {
                "get": {
                    "summary": "Check a transaction's status",
                    "parameters": [{
                        "name": "transaction_id",
                        "in": "query",
                        "required": true,
                        "schema": { "type": "integer", "format": "int64" }
                    }],
                    "responses": {
                        "200": json_response(
                            "The transaction's current status",
                            "TransactionStatusReport",
                        ),
                        "400": error_response("The query string is malformed"),
                        "404": error_response("The transaction does not exist"),
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "TransactionStatus": {
                    "type": "string",
                    "enum": ["pending", "confirmed", "canceled", "expired"]
                },
                "CreateTransactionRequest": {
                    "type": "object",
                    "required": ["user_id", "amount"],
                    "properties": {
                        "user_id": { "type": "integer", "format": "int64" },
                        "amount": {
                            "type": "number",
                            "format": "double",
                            "minimum": 0,
                            "exclusiveMinimum": true
                        }
                    }
                },
                "CreateTransactionResponse": {
                    "type": "object",
                    "required": ["transaction_id"],
                    "properties": {
                        "transaction_id": { "type": "integer", "format": "int64" }
                    }
                },
                "TransactionIdRequest": {
                    "type": "object",
                    "required": ["transaction_id"],
                    "properties": {
                        "transaction_id": { "type": "integer", "format": "int64" }
                    }
                },
                "StatusResponse": {
                    "type": "object",
                    "required": ["status"],
                    "properties": {
                        "status": { "$ref": "#/components/schemas/TransactionStatus" }
                    }
                },
                "TransactionStatusReport": {
                    "type": "object",
                    "required": ["transaction_id", "status"],
                    "properties": {
                        "transaction_id": { "type": "integer", "format": "int64" },
                        "status": { "$ref": "#/components/schemas/TransactionStatus" }
                    }
                },
                "Error": {
                    "type": "object",
                    "required": ["error"],
                    "properties": {
                        "error": { "type": "string" }
                    }
                }
            }
        }
    })
}

fn json_response(description: &str, schema: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": format!("#/components/schemas/{schema}") }
            }
        }
    })
}

fn error_response(description: &str) -> Value {
    json_response(description, "Error")
}

/// Serve the OpenAPI document as JSON.
pub async fn get_openapi_document() -> Response {
    Json(openapi_document()).into_response()
}

/// Render a Swagger UI page for the OpenAPI document.
pub async fn get_api_docs_page() -> Response {
    api_docs_view().into_response()
}

fn api_docs_view() -> Markup {
    let stylesheet =
        format!("https://unpkg.com/swagger-ui-dist@{SWAGGER_UI_VERSION}/swagger-ui.css");
    let bundle =
        format!("https://unpkg.com/swagger-ui-dist@{SWAGGER_UI_VERSION}/swagger-ui-bundle.js");
    let init_script = format!(
        "window.onload = () => {{ window.ui = SwaggerUIBundle({{ url: '{}', dom_id: '#swagger-ui' }}); }};",
        endpoints::API_DOCS_JSON
    );

    html! {
        (DOCTYPE)
        html lang="en"
        {
            head
            {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "API Docs - Commission Ledger" }
                link rel="stylesheet" href=(stylesheet);
            }

            body
            {
                div id="swagger-ui" {}
                script src=(bundle) {}
                script { (PreEscaped(init_script)) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use scraper::Selector;

    use crate::{
        endpoints,
        test_utils::{assert_content_type, assert_status_ok, assert_valid_html, parse_html_document},
    };

    use super::{get_api_docs_page, openapi_document};

    #[test]
    fn documents_every_api_route() {
        let document = openapi_document();

        assert_eq!(document["openapi"], "3.0.3");
        for (path, method) in [
            (endpoints::CREATE_TRANSACTION, "post"),
            (endpoints::CANCEL_TRANSACTION, "post"),
            (endpoints::CONFIRM_TRANSACTION, "post"),
            (endpoints::CHECK_TRANSACTION, "get"),
        ] {
            assert!(
                document["paths"][path][method].is_object(),
                "{method} {path} is not documented"
            );
        }
    }

    #[test]
    fn documents_status_codes() {
        let document = openapi_document();
        let paths = &document["paths"];

        assert!(paths[endpoints::CREATE_TRANSACTION]["post"]["responses"]["201"].is_object());
        assert!(paths[endpoints::CONFIRM_TRANSACTION]["post"]["responses"]["409"].is_object());
        assert!(paths[endpoints::CANCEL_TRANSACTION]["post"]["responses"]["409"].is_null());
    }

    #[test]
    fn schema_references_resolve() {
        let document = openapi_document();
        let schemas = &document["components"]["schemas"];

        assert_eq!(
            schemas["TransactionStatus"]["enum"],
            serde_json::json!(["pending", "confirmed", "canceled", "expired"])
        );
        assert_eq!(
            schemas["CreateTransactionRequest"]["required"],
            serde_json::json!(["user_id", "amount"])
        );

        let text = document.to_string();
        for name in text
            .split("\"#/components/schemas/")
            .skip(1)
            .filter_map(|rest| rest.split('"').next())
        {
            assert!(schemas[name].is_object(), "missing schema {name}");
        }
    }

    #[tokio::test]
    async fn docs_page_loads_document() {
        let response = get_api_docs_page().await;

        assert_status_ok(&response);
        assert_content_type(&response, "text/html; charset=utf-8");
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        assert!(
            html.select(&Selector::parse("#swagger-ui").unwrap())
                .next()
                .is_some()
        );
        let scripts: String = html
            .select(&Selector::parse("script").unwrap())
            .flat_map(|script| script.text())
            .collect();
        assert!(scripts.contains(endpoints::API_DOCS_JSON));
    }
}
