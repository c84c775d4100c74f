use async_trait::async_trait;
use solana_account_decoder::parse_token::UiTokenAmount;
use solana_account_decoder::UiAccountEncoding;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcSendTransactionConfig,
};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_client::rpc_request::RpcError;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChainClient, Confirmation, LargestHolder, TokenAmount, WalletTokenAccount};
use crate::config::RpcConfig;
use crate::error::{Error, Result};
use crate::raydium::mint::decode_token_account;
use crate::raydium::program::TOKEN_ACCOUNT_LEN;

/// `getMultipleAccounts` limit
const MAX_MULTIPLE_ACCOUNTS: usize = 100;

/// JSON-RPC "invalid params", returned for token queries on missing accounts
const INVALID_PARAMS: i64 = -32602;

/// JSON-RPC backed [`ChainClient`]
pub struct RpcChainClient {
    rpc: Arc<RpcClient>,
    commitment: CommitmentConfig,
    confirm_poll: Duration,
}

impl RpcChainClient {
    pub fn new(endpoint: &str, commitment: CommitmentConfig, timeout: Duration, confirm_poll: Duration) -> Self {
        let rpc = RpcClient::new_with_timeout_and_commitment(endpoint.to_string(), timeout, commitment);
        Self {
            rpc: Arc::new(rpc),
            commitment,
            confirm_poll,
        }
    }

    pub fn from_config(config: &RpcConfig) -> Result<Self> {
        let commitment = config
            .commitment_config()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self::new(
            &config.endpoint,
            commitment,
            Duration::from_millis(config.timeout_ms),
            Duration::from_millis(config.confirm_poll_ms),
        ))
    }
}

fn parse_ui_amount(ui: &UiTokenAmount) -> Result<TokenAmount> {
    let amount = ui
        .amount
        .parse::<u64>()
        .map_err(|e| Error::AccountDecode(format!("token amount {:?}: {}", ui.amount, e)))?;
    Ok(TokenAmount {
        amount,
        decimals: ui.decimals,
        ui_amount: ui.ui_amount,
    })
}

/// Token queries answer a missing account or mint with an invalid-params
/// error rather than a null value. Report those as `AccountNotFound`.
fn token_query_error(address: &Pubkey, e: ClientError) -> Error {
    let missing = matches!(
        e.kind(),
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. })
            if *code == INVALID_PARAMS && message.contains("could not find")
    );
    if missing {
        Error::AccountNotFound(address.to_string())
    } else {
        e.into()
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        let response = self
            .rpc
            .get_account_with_commitment(address, self.commitment)
            .await?;
        Ok(response.value)
    }

    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Account>>> {
        let mut accounts = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(MAX_MULTIPLE_ACCOUNTS) {
            let response = self
                .rpc
                .get_multiple_accounts_with_commitment(chunk, self.commitment)
                .await?;
            accounts.extend(response.value);
        }
        Ok(accounts)
    }

    async fn get_token_account_balance(&self, address: &Pubkey) -> Result<TokenAmount> {
        let response = self
            .rpc
            .get_token_account_balance_with_commitment(address, self.commitment)
            .await
            .map_err(|e| token_query_error(address, e))?;
        parse_ui_amount(&response.value)
    }

    async fn get_token_largest_accounts(&self, mint: &Pubkey) -> Result<Vec<LargestHolder>> {
        let response = self
            .rpc
            .get_token_largest_accounts_with_commitment(mint, self.commitment)
            .await
            .map_err(|e| token_query_error(mint, e))?;

        response
            .value
            .iter()
            .map(|holder| {
                let address = Pubkey::from_str(&holder.address)
                    .map_err(|e| Error::AccountDecode(format!("holder {}: {}", holder.address, e)))?;
                Ok(LargestHolder {
                    address,
                    amount: parse_ui_amount(&holder.amount)?,
                })
            })
            .collect()
    }

    async fn get_token_supply(&self, mint: &Pubkey) -> Result<TokenAmount> {
        let response = self
            .rpc
            .get_token_supply_with_commitment(mint, self.commitment)
            .await
            .map_err(|e| token_query_error(mint, e))?;
        parse_ui_amount(&response.value)
    }

    async fn get_wallet_token_accounts(&self, owner: &Pubkey) -> Result<Vec<WalletTokenAccount>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![
                RpcFilterType::DataSize(TOKEN_ACCOUNT_LEN),
                // SPL token account: owner lives right after the mint
                RpcFilterType::Memcmp(Memcmp::new_base58_encoded(32, owner.as_ref())),
            ]),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.commitment),
                ..Default::default()
            },
            ..Default::default()
        };

        let accounts = self
            .rpc
            .get_program_accounts_with_config(&spl_token::id(), config)
            .await?;

        let mut wallet_accounts = Vec::with_capacity(accounts.len());
        for (address, account) in accounts {
            match decode_token_account(&account.data) {
                Ok(info) => wallet_accounts.push(WalletTokenAccount {
                    address,
                    mint: info.mint,
                    amount: info.amount,
                }),
                Err(e) => warn!("Skipping undecodable token account {}: {}", address, e),
            }
        }
        Ok(wallet_accounts)
    }

    async fn get_latest_blockhash(&self) -> Result<(Hash, u64)> {
        let (hash, last_valid) = self
            .rpc
            .get_latest_blockhash_with_commitment(self.commitment)
            .await?;
        Ok((hash, last_valid))
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.commitment.commitment),
            ..Default::default()
        };

        self.rpc
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| Error::TransactionSend(e.to_string()))
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        last_valid_block_height: u64,
    ) -> Result<Confirmation> {
        loop {
            let status = self
                .rpc
                .get_signature_status_with_commitment(signature, self.commitment)
                .await?;

            match status {
                Some(Ok(())) => return Ok(Confirmation::Confirmed),
                Some(Err(e)) => return Ok(Confirmation::Failed(e.to_string())),
                None => {
                    let height = self
                        .rpc
                        .get_block_height_with_commitment(self.commitment)
                        .await?;
                    if height > last_valid_block_height {
                        return Ok(Confirmation::Expired);
                    }
                    debug!(
                        "{} not landed yet (height {} / {})",
                        signature, height, last_valid_block_height
                    );
                    tokio::time::sleep(self.confirm_poll).await;
                }
            }
        }
    }
}
