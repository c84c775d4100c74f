//! Transaction assembly for swaps

use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::VersionedTransaction,
};

use crate::config::TradingConfig;
use crate::error::{Error, Result};

/// Wraps swap instructions with the priority fee and signs them into a
/// v0 transaction
#[derive(Debug, Clone)]
pub struct TransactionAssembler {
    compute_unit_price: u64,
    compute_unit_limit: u32,
}

impl TransactionAssembler {
    pub fn new(compute_unit_price: u64, compute_unit_limit: u32) -> Self {
        Self {
            compute_unit_price,
            compute_unit_limit,
        }
    }

    pub fn from_config(config: &TradingConfig) -> Self {
        Self::new(config.compute_unit_price, config.compute_unit_limit)
    }

    /// Priority fee and compute limit, always the first two instructions
    pub fn compute_budget(&self) -> Vec<Instruction> {
        vec![
            ComputeBudgetInstruction::set_compute_unit_price(self.compute_unit_price),
            ComputeBudgetInstruction::set_compute_unit_limit(self.compute_unit_limit),
        ]
    }

    /// Compile and sign. The wallet pays; `extra_signers` are the swap
    /// builder's ephemeral keys.
    pub fn assemble(
        &self,
        payer: &Keypair,
        instructions: &[Instruction],
        extra_signers: &[Keypair],
        recent_blockhash: Hash,
    ) -> Result<VersionedTransaction> {
        let message = v0::Message::try_compile(&payer.pubkey(), instructions, &[], recent_blockhash)
            .map_err(|e| Error::TransactionBuild(format!("compile v0 message: {}", e)))?;

        let mut signers: Vec<&Keypair> = Vec::with_capacity(1 + extra_signers.len());
        signers.push(payer);
        signers.extend(extra_signers.iter());

        VersionedTransaction::try_new(VersionedMessage::V0(message), signers.as_slice())
            .map_err(|e| Error::TransactionBuild(format!("sign transaction: {}", e)))
    }
}

/// Derive associated token account address
pub fn derive_ata(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(wallet, mint)
}

/// Create the wallet's token account for `mint` unless it already exists
pub fn create_ata_idempotent(payer: &Pubkey, mint: &Pubkey) -> Instruction {
    spl_associated_token_account::instruction::create_associated_token_account_idempotent(
        payer,
        payer,
        mint,
        &spl_token::id(),
    )
}

/// Close an emptied token account, returning its rent to the owner
pub fn close_account(account: &Pubkey, owner: &Pubkey) -> Result<Instruction> {
    spl_token::instruction::close_account(&spl_token::id(), account, owner, owner, &[])
        .map_err(|e| Error::TransactionBuild(format!("close account {}: {}", account, e)))
}
