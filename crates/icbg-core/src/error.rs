use icbg_geodata::GeodataError;
use icbg_notify::NotifyError;
use icbg_order::OrderError;
use icbg_pairing::PairingError;
use thiserror::Error;

use crate::admission::AdmissionError;

#[derive(Debug, Error)]
pub enum CoreError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error(transparent)]
	Admission(#[from] AdmissionError),
	#[error(transparent)]
	Geodata(#[from] GeodataError),
	#[error(transparent)]
	Pairing(#[from] PairingError),
	#[error(transparent)]
	Notify(#[from] NotifyError),
	#[error(transparent)]
	Order(#[from] OrderError),
}
