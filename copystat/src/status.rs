//! Copyright status determination.
//!
//! A pure decision procedure over jurisdiction, publication year, the
//! data-coverage window, and match evidence.  Labels are structured
//! values rendered to strings on output; the string set is open (year
//! and country suffixes) so no enumeration of rendered labels exists.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::publication::{CountryClassification, Publication};

/// Latest publication year represented in the bundled reference data.
pub const DEFAULT_MAX_DATA_YEAR: i32 = 1991;

/// Works published before `current year - 96` have aged out of
/// copyright in every scenario this tool evaluates.
pub fn default_expiration_year() -> i32 {
    chrono::Utc::now().year() - 96
}

/// The fixed vocabulary a status label is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusBase {
    UsRenewed,
    UsRegisteredNotRenewed,
    UsNoMatch,
    ForeignRenewed,
    ForeignRegisteredNotRenewed,
    ForeignNoMatch,
    CountryUnknownRenewed,
    CountryUnknownRegisteredNotRenewed,
    CountryUnknownNoMatch,
    UsPreExpiration,
    ForeignPreExpiration,
    CountryUnknownPreExpiration,
    OutOfDataRange,
}

impl StatusBase {
    fn stem(&self) -> &'static str {
        match self {
            StatusBase::UsRenewed => "US_RENEWED",
            StatusBase::UsRegisteredNotRenewed => "US_REGISTERED_NOT_RENEWED",
            StatusBase::UsNoMatch => "US_NO_MATCH",
            StatusBase::ForeignRenewed => "FOREIGN_RENEWED",
            StatusBase::ForeignRegisteredNotRenewed => "FOREIGN_REGISTERED_NOT_RENEWED",
            StatusBase::ForeignNoMatch => "FOREIGN_NO_MATCH",
            StatusBase::CountryUnknownRenewed => "COUNTRY_UNKNOWN_RENEWED",
            StatusBase::CountryUnknownRegisteredNotRenewed => {
                "COUNTRY_UNKNOWN_REGISTERED_NOT_RENEWED"
            }
            StatusBase::CountryUnknownNoMatch => "COUNTRY_UNKNOWN_NO_MATCH",
            StatusBase::UsPreExpiration => "US_PRE",
            StatusBase::ForeignPreExpiration => "FOREIGN_PRE",
            StatusBase::CountryUnknownPreExpiration => "COUNTRY_UNKNOWN_PRE",
            StatusBase::OutOfDataRange => "OUT_OF_DATA_RANGE",
        }
    }
}

/// A status label: fixed base plus optional year and country suffixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLabel {
    pub base: StatusBase,
    pub year: Option<i32>,
    pub country: Option<String>,
}

impl StatusLabel {
    fn new(base: StatusBase) -> Self {
        StatusLabel {
            base,
            year: None,
            country: None,
        }
    }

    fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    fn with_country(mut self, country: Option<&str>) -> Self {
        self.country = country.map(|c| c.to_string());
        self
    }

    /// Render the label string, e.g. `US_PRE_1929` or
    /// `FOREIGN_REGISTERED_NOT_RENEWED_gbr`.
    pub fn render(&self) -> String {
        let mut label = self.base.stem().to_string();
        if let Some(year) = self.year {
            label.push('_');
            label.push_str(&year.to_string());
        }
        if let Some(country) = &self.country {
            label.push('_');
            label.push_str(country);
        }
        label
    }
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// The rule that produced a status; the machine-readable citation
/// explaining WHY the label was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusRule {
    UsPreCopyrightExpiration,
    ForeignPreCopyrightExpiration,
    UsRenewalPeriodNotRenewed,
    UsRenewalPeriodRenewed,
    UsRenewalPeriodNoMatch,
    UsRegisteredNoRenewal,
    UsRenewalFound,
    UsNoMatch,
    UsBothRegAndRenewal,
    ForeignRenewed,
    ForeignRegisteredNotRenewed,
    ForeignNoMatch,
    CountryUnknownRenewed,
    CountryUnknownRegistered,
    CountryUnknownNoMatch,
    OutOfDataRange,
}

impl StatusRule {
    /// Stable citation string.
    pub fn citation(&self) -> &'static str {
        match self {
            StatusRule::UsPreCopyrightExpiration => "us_pre_copyright_expiration",
            StatusRule::ForeignPreCopyrightExpiration => "foreign_pre_copyright_expiration",
            StatusRule::UsRenewalPeriodNotRenewed => "us_renewal_period_not_renewed",
            StatusRule::UsRenewalPeriodRenewed => "us_renewal_period_renewed",
            StatusRule::UsRenewalPeriodNoMatch => "us_renewal_period_no_match",
            StatusRule::UsRegisteredNoRenewal => "us_registered_no_renewal",
            StatusRule::UsRenewalFound => "us_renewal_found",
            StatusRule::UsNoMatch => "us_no_match",
            StatusRule::UsBothRegAndRenewal => "us_both_reg_and_renewal",
            StatusRule::ForeignRenewed => "foreign_renewed",
            StatusRule::ForeignRegisteredNotRenewed => "foreign_registered_not_renewed",
            StatusRule::ForeignNoMatch => "foreign_no_match",
            StatusRule::CountryUnknownRenewed => "country_unknown_renewed",
            StatusRule::CountryUnknownRegistered => "country_unknown_registered",
            StatusRule::CountryUnknownNoMatch => "country_unknown_no_match",
            StatusRule::OutOfDataRange => "out_of_data_range",
        }
    }

    /// Human-readable explanation for reports.
    pub fn description(&self) -> &'static str {
        match self {
            StatusRule::UsPreCopyrightExpiration => {
                "Published before the copyright expiration year"
            }
            StatusRule::ForeignPreCopyrightExpiration => {
                "Foreign work published before copyright expiration"
            }
            StatusRule::UsRenewalPeriodNotRenewed => {
                "US renewal period: registered but not renewed"
            }
            StatusRule::UsRenewalPeriodRenewed => "US renewal period: registered and renewed",
            StatusRule::UsRenewalPeriodNoMatch => {
                "US renewal period: no registration data found"
            }
            StatusRule::UsRegisteredNoRenewal => "US: registered but no renewal found",
            StatusRule::UsRenewalFound => "US: renewal record found",
            StatusRule::UsNoMatch => "US: no registration or renewal data found",
            StatusRule::UsBothRegAndRenewal => "US: both registration and renewal found",
            StatusRule::ForeignRenewed => "Foreign work with US renewal",
            StatusRule::ForeignRegisteredNotRenewed => "Foreign work with US registration only",
            StatusRule::ForeignNoMatch => "Foreign work with no US copyright records",
            StatusRule::CountryUnknownRenewed => "Unknown country with renewal found",
            StatusRule::CountryUnknownRegistered => "Unknown country with registration only",
            StatusRule::CountryUnknownNoMatch => "Unknown country with no matches",
            StatusRule::OutOfDataRange => "Year beyond available copyright data",
        }
    }
}

/// Determine the final copyright status for a publication and write
/// both the rendered label and the structured rule citation back onto
/// it.  First matching rule wins.
///
/// * `copyright_expiration_year` - earliest year still potentially in
///   copyright; defaults to the current year minus 96.
/// * `max_data_year` - latest year covered by the reference corpora;
///   defaults to [`DEFAULT_MAX_DATA_YEAR`].
pub fn determine_copyright_status(
    publication: &mut Publication,
    copyright_expiration_year: Option<i32>,
    max_data_year: Option<i32>,
) -> String {
    let expiration = copyright_expiration_year.unwrap_or_else(default_expiration_year);
    let max_data = max_data_year.unwrap_or(DEFAULT_MAX_DATA_YEAR);

    let has_reg = publication.has_registration_match();
    let has_ren = publication.has_renewal_match();
    let classification = publication.country_classification;
    let country = publication.country_code.clone();

    let (label, rule) = decide(
        classification,
        publication.year,
        has_reg,
        has_ren,
        expiration,
        max_data,
        country.as_deref(),
    );

    publication.copyright_status = label.render();
    publication.status_label = Some(label);
    publication.status_rule = Some(rule);
    publication.copyright_status.clone()
}

/// The decision table proper.  Pure; exercised directly by tests.
pub fn decide(
    classification: CountryClassification,
    year: Option<i32>,
    has_reg: bool,
    has_ren: bool,
    expiration_year: i32,
    max_data_year: i32,
    country_code: Option<&str>,
) -> (StatusLabel, StatusRule) {
    // Pre-expiration works are out of copyright everywhere we look.
    // The expiration year itself is IN the renewal period.
    if let Some(y) = year {
        if y < expiration_year {
            return match classification {
                CountryClassification::Us => (
                    StatusLabel::new(StatusBase::UsPreExpiration).with_year(expiration_year),
                    StatusRule::UsPreCopyrightExpiration,
                ),
                CountryClassification::NonUs => (
                    StatusLabel::new(StatusBase::ForeignPreExpiration)
                        .with_year(expiration_year)
                        .with_country(country_code),
                    StatusRule::ForeignPreCopyrightExpiration,
                ),
                CountryClassification::Unknown => (
                    StatusLabel::new(StatusBase::CountryUnknownPreExpiration)
                        .with_year(expiration_year),
                    StatusRule::UsPreCopyrightExpiration,
                ),
            };
        }

        // max_data_year itself is still in range.
        if y > max_data_year {
            return (
                StatusLabel::new(StatusBase::OutOfDataRange).with_year(max_data_year),
                StatusRule::OutOfDataRange,
            );
        }
    }

    let in_renewal_period = year
        .map(|y| y >= expiration_year && y <= 1977)
        .unwrap_or(false);

    match classification {
        CountryClassification::Us if in_renewal_period => {
            if has_ren {
                (
                    StatusLabel::new(StatusBase::UsRenewed),
                    StatusRule::UsRenewalPeriodRenewed,
                )
            } else if has_reg {
                (
                    StatusLabel::new(StatusBase::UsRegisteredNotRenewed),
                    StatusRule::UsRenewalPeriodNotRenewed,
                )
            } else {
                (
                    StatusLabel::new(StatusBase::UsNoMatch),
                    StatusRule::UsRenewalPeriodNoMatch,
                )
            }
        }

        CountryClassification::Us => match (has_reg, has_ren) {
            (true, true) => (
                StatusLabel::new(StatusBase::UsRenewed),
                StatusRule::UsBothRegAndRenewal,
            ),
            (false, true) => (
                StatusLabel::new(StatusBase::UsRenewed),
                StatusRule::UsRenewalFound,
            ),
            (true, false) => (
                StatusLabel::new(StatusBase::UsRegisteredNotRenewed),
                StatusRule::UsRegisteredNoRenewal,
            ),
            (false, false) => (StatusLabel::new(StatusBase::UsNoMatch), StatusRule::UsNoMatch),
        },

        CountryClassification::NonUs => {
            if has_ren {
                (
                    StatusLabel::new(StatusBase::ForeignRenewed).with_country(country_code),
                    StatusRule::ForeignRenewed,
                )
            } else if has_reg {
                (
                    StatusLabel::new(StatusBase::ForeignRegisteredNotRenewed)
                        .with_country(country_code),
                    StatusRule::ForeignRegisteredNotRenewed,
                )
            } else {
                (
                    StatusLabel::new(StatusBase::ForeignNoMatch).with_country(country_code),
                    StatusRule::ForeignNoMatch,
                )
            }
        }

        CountryClassification::Unknown => {
            if has_ren {
                (
                    StatusLabel::new(StatusBase::CountryUnknownRenewed),
                    StatusRule::CountryUnknownRenewed,
                )
            } else if has_reg {
                (
                    StatusLabel::new(StatusBase::CountryUnknownRegisteredNotRenewed),
                    StatusRule::CountryUnknownRegistered,
                )
            } else {
                (
                    StatusLabel::new(StatusBase::CountryUnknownNoMatch),
                    StatusRule::CountryUnknownNoMatch,
                )
            }
        }
    }
}
