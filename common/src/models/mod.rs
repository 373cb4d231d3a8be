mod currency;
mod rate;

pub use currency::{Cryptocurrency, FiatCurrency};
pub use rate::{RateSnapshot, RateTable};
