use super::Backend;
use super::wire::{AskRequest, AskResponse, TokenForm, TokenResponse, UploadResponse, classify_response};
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{BackendError, BackendResult};
use crate::types::{Answer, Credential, DocumentAccepted, DocumentScope, DocumentUpload, ModelHint};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// reqwest client for the Synapse backend.
pub struct HttpBackend {
    client: Client,
    token_url: Url,
    upload_url: Url,
    ask_url: Url,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        Self::with_client(Client::new(), config, credentials)
    }

    pub fn with_client(
        client: Client,
        config: &ClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            client,
            token_url: config.endpoint("token"),
            upload_url: config.endpoint("upload"),
            ask_url: config.endpoint("ask"),
            credentials,
        }
    }

    /// Attach the stored credential, if any. A missing or unreadable slot
    /// sends the request without one and lets the backend decide.
    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.load().await {
            Ok(Some(credential)) => request.bearer_auth(credential.secret()),
            Ok(None) => request,
            Err(err) => {
                tracing::warn!(error = %err, "could not read credential; sending unauthenticated");
                request
            }
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> BackendResult<T> {
        let response = request.send().await.map_err(|err| {
            tracing::warn!(endpoint, error = %err, "backend unreachable");
            BackendError::Unreachable(err.to_string())
        })?;
        let status = response.status();
        let body = response.text().await?;

        let result = classify_response(status, &body);
        match &result {
            Ok(_) => tracing::debug!(endpoint, status = status.as_u16(), "backend call succeeded"),
            Err(err) => {
                tracing::warn!(endpoint, status = status.as_u16(), error = %err, "backend call failed")
            }
        }
        result
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn authenticate(&self, identifier: &str, secret: &str) -> BackendResult<Credential> {
        let request = self.client.post(self.token_url.clone()).form(&TokenForm {
            username: identifier,
            password: secret,
        });

        let token: TokenResponse = self.execute("token", request).await?;
        if token.access_token.trim().is_empty() {
            return Err(BackendError::InvalidResponse(
                "empty access_token".to_string(),
            ));
        }
        Ok(Credential::new(token.access_token))
    }

    async fn upload_document(&self, document: &DocumentUpload) -> BackendResult<DocumentAccepted> {
        let form = Form::new().part("file", document_part(document));

        let request = self
            .authorize(self.client.post(self.upload_url.clone()).multipart(form))
            .await;

        let accepted: UploadResponse = self.execute("upload", request).await?;
        let name = accepted
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| document.file_name.clone());
        Ok(DocumentAccepted {
            name: DocumentScope::new(name),
        })
    }

    async fn ask(
        &self,
        question: &str,
        model: &ModelHint,
        scope: Option<&DocumentScope>,
    ) -> BackendResult<Answer> {
        let request = self
            .authorize(self.client.post(self.ask_url.clone()).json(&AskRequest {
                question,
                model_type: model.as_str(),
                file_name: scope.map(DocumentScope::as_str),
            }))
            .await;

        let answer: AskResponse = self.execute("ask", request).await?;
        Ok(Answer {
            text: answer.answer,
            model_used: answer.used_model,
        })
    }
}

fn document_part(document: &DocumentUpload) -> Part {
    let part = || Part::bytes(document.bytes.clone()).file_name(document.file_name.clone());
    part().mime_str(&document.mime_type).unwrap_or_else(|err| {
        tracing::warn!(mime = %document.mime_type, error = %err, "ignoring invalid content type");
        part()
    })
}
