//! Builds the `warp` filter tree for the HTTP surface: translates requests into
//! [`evml_engine::Engine`] calls and back into the JSON shapes in [`types`].

pub mod handlers;
pub mod types;

use std::convert::Infallible;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use evml_engine::Engine;
use tokio::sync::mpsc;
use warp::{Filter, Rejection, Reply};

fn with_engine(
    engine: Arc<Engine>,
) -> impl Filter<Extract = (Arc<Engine>,), Error = Infallible> + Clone {
    warp::any().map(move || engine.clone())
}

fn with_submit(
    submit: mpsc::Sender<Vec<u8>>,
) -> impl Filter<Extract = (mpsc::Sender<Vec<u8>>,), Error = Infallible> + Clone {
    warp::any().map(move || submit.clone())
}

/// Assembles every route in the HTTP surface (see `SPEC_FULL.md` §6), with CORS
/// (`Access-Control-Allow-Origin: *`) applied to every response.
pub fn routes(
    engine: Arc<Engine>,
    submit: mpsc::Sender<Vec<u8>>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let account = warp::path!("account" / Address)
        .and(warp::get())
        .and(warp::query::<types::AccountQuery>())
        .and(with_engine(engine.clone()))
        .and_then(handlers::account);

    let call = warp::path("call")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_engine(engine.clone()))
        .and_then(handlers::call);

    let raw_tx = warp::path("rawtx")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_engine(engine.clone()))
        .and(with_submit(submit))
        .and_then(handlers::raw_transaction);

    let transaction = warp::path!("tx" / B256)
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(handlers::transaction_receipt);

    let info = warp::path("info")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(handlers::info);

    let poa = warp::path("poa")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(handlers::poa);

    let genesis = warp::path("genesis")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(handlers::genesis);

    let version = warp::path("version")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(handlers::version);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(["GET", "POST"])
        .allow_headers(["content-type"]);

    account
        .or(call)
        .or(raw_tx)
        .or(transaction)
        .or(info)
        .or(poa)
        .or(genesis)
        .or(version)
        .recover(handlers::handle_rejection)
        .with(cors)
}
