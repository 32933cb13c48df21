//! Buy-price lookups used to annotate lobby messages.

use coinbase_data::{Error, Params, Price, Session, Transport, UreqTransport};

/// A blocking source of the current buy price.
///
/// Implementations may do network I/O; callers run them on a blocking thread.
pub trait PriceSource: Send + Sync + 'static {
    fn buy_price(&self) -> Result<Price, Error>;
}

impl<F> PriceSource for F
where
    F: Fn() -> Result<Price, Error> + Send + Sync + 'static,
{
    fn buy_price(&self) -> Result<Price, Error> {
        self()
    }
}

/// Buy price for one currency pair from the Coinbase data API.
#[derive(Debug)]
pub struct CoinbasePrice<T: Transport = UreqTransport> {
    session: Session<T>,
    params: Params,
}

impl<T: Transport> CoinbasePrice<T> {
    pub fn new(session: Session<T>, currency_pair: &str) -> Self {
        Self {
            session,
            params: Params::new().with("currency_pair", currency_pair),
        }
    }
}

impl<T: Transport + 'static> PriceSource for CoinbasePrice<T> {
    fn buy_price(&self) -> Result<Price, Error> {
        self.session
            .get_buy_price(&self.params)?
            .into_one()
            .ok_or_else(|| {
                Error::Deserialization("expected a single price record, got a list".to_string())
            })
    }
}

/// Append the price (or its absence) to a lobby message.
pub fn annotate(text: &str, price: Option<&Price>) -> String {
    match price {
        Some(p) => format!("{text}' price is {} {}", p.amount, p.currency),
        None => format!("{text}' price is unavailable"),
    }
}
