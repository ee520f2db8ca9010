//! Domain service ports and their production implementations.

mod certificate_signer;
mod certificate_validation;
mod ev_certificate;
mod ocsp;
mod tariff;

pub use certificate_signer::{CertificateSignerService, IsoVersion, OpcpCpoCertificateSignerService};
pub use certificate_validation::{CertificateValidationService, OnlineCertificateValidationService};
pub use ev_certificate::{EvCertificateProvider, OpcpMoEvCertificateProvider};
pub use tariff::{BasicKwhTariffService, TariffService};

#[cfg(any(test, feature = "testing"))]
pub use certificate_signer::MockCertificateSignerService;
#[cfg(any(test, feature = "testing"))]
pub use certificate_validation::MockCertificateValidationService;
#[cfg(any(test, feature = "testing"))]
pub use ev_certificate::MockEvCertificateProvider;
#[cfg(any(test, feature = "testing"))]
pub use tariff::MockTariffService;
