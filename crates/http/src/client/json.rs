//! JSON helpers layered on top of [`AuthGateway::send`]

use super::{AuthGateway, ClientError, RequestOptions};
use serde::de::DeserializeOwned;

impl AuthGateway {
    /// Send through the gateway and decode a successful JSON body.
    ///
    /// Non-2xx responses become errors via [`ClientError::from_status`],
    /// carrying the response text as the message.
    ///
    /// # Errors
    ///
    /// Everything [`AuthGateway::send`] returns, plus status errors and body
    /// decoding failures
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let response = self.send(url, options).await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    /// GET `url` and decode the JSON body
    ///
    /// # Errors
    ///
    /// See [`AuthGateway::execute_json`]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        self.execute_json(url, RequestOptions::get()).await
    }
}
