use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use evml_common::error::Error;
use evml_engine::Engine;
use tokio::sync::mpsc;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::types::*;

const RAWTX_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug)]
pub struct EngineError(pub Error);

impl warp::reject::Reject for EngineError {}

pub fn reject(err: Error) -> Rejection {
    warp::reject::custom(EngineError(err))
}

pub async fn account(
    address: Address,
    query: AccountQuery,
    engine: Arc<Engine>,
) -> Result<impl Reply, Rejection> {
    let balance = engine.balance(address, query.from_pool).map_err(reject)?;
    let nonce = engine.nonce(address, query.from_pool).map_err(reject)?;
    let bytecode = engine.code(address, query.from_pool).map_err(reject)?;
    Ok(warp::reply::json(&AccountInfo {
        address,
        balance,
        nonce,
        bytecode,
    }))
}

pub async fn call(args: SendTxArgs, engine: Arc<Engine>) -> Result<impl Reply, Rejection> {
    let gas = if args.gas == 0 { 1_000_000 } else { args.gas };
    let output = engine
        .call(args.from, args.to, args.data.to_vec(), gas)
        .map_err(reject)?;
    Ok(warp::reply::json(&CallResult { data: output.into() }))
}

/// Decodes and validates the raw transaction, registers a receipt promise, submits the
/// bytes to consensus, then waits up to 15 seconds for the promise to resolve.
pub async fn raw_transaction(
    body: warp::hyper::body::Bytes,
    engine: Arc<Engine>,
    submit: mpsc::Sender<Vec<u8>>,
) -> Result<impl Reply, Rejection> {
    let hex_str = String::from_utf8_lossy(&body);
    let trimmed = hex_str.trim().trim_start_matches("0x");
    let raw = hex::decode(trimmed)
        .map_err(|_| reject(Error::Decode(evml_common::error::DecodeError::Hex)))?;

    let tx = engine.check_tx(&raw).map_err(reject)?;
    let promise = engine.create_receipt_promise(tx.hash());

    if submit.send(raw).await.is_err() {
        return Err(reject(Error::not_found("consensus is not accepting transactions")));
    }

    match tokio::time::timeout(RAWTX_TIMEOUT, promise.wait()).await {
        Ok(Ok(receipt)) => Ok(warp::reply::json(&receipt)),
        Ok(Err(e)) => Err(reject(e)),
        Err(_) => Err(reject(Error::Timeout)),
    }
}

pub async fn transaction_receipt(hash: B256, engine: Arc<Engine>) -> Result<impl Reply, Rejection> {
    let receipt = engine.get_receipt(hash).map_err(reject)?;
    Ok(warp::reply::json(&receipt))
}

pub async fn info(engine: Arc<Engine>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&InfoResponse {
        min_gas_price: engine.min_gas_price().to_string(),
    }))
}

pub async fn poa(engine: Arc<Engine>) -> Result<impl Reply, Rejection> {
    match engine.poa() {
        Some(poa) => Ok(warp::reply::json(&PoaInfo {
            address: poa.address,
            abi: poa.abi.clone(),
        })),
        None => Err(reject(Error::not_found("no POA contract configured"))),
    }
}

pub async fn genesis(engine: Arc<Engine>) -> Result<impl Reply, Rejection> {
    match engine.genesis_doc() {
        Some(doc) => Ok(warp::reply::json(doc)),
        None => Err(reject(Error::not_found("genesis not loaded"))),
    }
}

pub async fn version() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&VersionInfo {
        evm_lite: concat!(env!("CARGO_PKG_VERSION"), "-evml").to_string(),
    }))
}

/// Every error surfaces as HTTP 500, preserved from the original service for client
/// compatibility (see the not-found status code decision recorded for this deployment).
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let message = if let Some(EngineError(e)) = err.find() {
        e.to_string()
    } else if err.is_not_found() {
        "route not found".to_string()
    } else {
        "bad request".to_string()
    };

    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorBody { error: message }),
        status,
    ))
}
