use async_trait::async_trait;
use postgrest::Postgrest;
use serde_json::json;

use crate::GenericError;

use super::{required_var, Destination};

#[async_trait]
pub trait DestinationStoreService {
    fn new() -> Result<Self, GenericError>
    where
        Self: Sized;
    async fn list_destinations(&self) -> Result<Vec<Destination>, GenericError>;
    async fn update_iata_code(&self, row_id: i64, code: &str) -> Result<(), GenericError>;
}

pub struct SupabaseService {
    client: Postgrest,
    supabase_token: String,
}

#[async_trait]
impl DestinationStoreService for SupabaseService {
    fn new() -> Result<Self, GenericError> {
        let supabase_token = required_var("SUPABASE_TOKEN")?;
        let client = Postgrest::new(&required_var("SUPABASE_ENDPOINT")?)
            .insert_header("apikey", format!("{}", supabase_token));
        Ok(SupabaseService {
            client,
            supabase_token,
        })
    }

    async fn list_destinations(&self) -> Result<Vec<Destination>, GenericError> {
        let raw_resp = self
            .client
            .from("destinations")
            .auth(&self.supabase_token)
            .select("*")
            .order("id")
            .execute()
            .await?
            .text()
            .await?;

        let rows: Vec<Destination> = serde_json::from_str(&raw_resp)?;
        Ok(rows)
    }

    async fn update_iata_code(&self, row_id: i64, code: &str) -> Result<(), GenericError> {
        let json = json!({ "iata_code": code }).to_string();
        self.client
            .from("destinations")
            .auth(&self.supabase_token)
            .eq("id", row_id.to_string())
            .update(json)
            .execute()
            .await?;

        Ok(())
    }
}
