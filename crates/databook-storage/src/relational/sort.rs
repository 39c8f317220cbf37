//! Sort keys accepted from callers. Each key maps to one fixed column
//! expression; nothing caller-supplied is ever spliced into SQL.

use std::convert::Infallible;
use std::str::FromStr;

/// `MM/DD/YYYY` text reordered so it sorts chronologically.
const START_DATE_ISO: &str =
    "(substr(start_date, 7, 4) || '-' || substr(start_date, 1, 2) || '-' || substr(start_date, 4, 2))";
const END_DATE_ISO: &str =
    "(substr(end_date, 7, 4) || '-' || substr(end_date, 1, 2) || '-' || substr(end_date, 4, 2))";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Infallible;

    /// Anything other than `asc` sorts descending.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContractSortKey {
    Vendor,
    #[default]
    Amount,
    StartDate,
    EndDate,
}

impl ContractSortKey {
    pub fn column(self) -> &'static str {
        match self {
            ContractSortKey::Vendor => "vendor_name",
            ContractSortKey::Amount => "award_amount",
            ContractSortKey::StartDate => START_DATE_ISO,
            ContractSortKey::EndDate => END_DATE_ISO,
        }
    }
}

impl FromStr for ContractSortKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "vendor" => ContractSortKey::Vendor,
            "date" | "start_date" => ContractSortKey::StartDate,
            "end_date" => ContractSortKey::EndDate,
            _ => ContractSortKey::default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VendorSortKey {
    #[default]
    Name,
    Contracts,
    Amount,
}

impl VendorSortKey {
    pub fn column(self) -> &'static str {
        match self {
            VendorSortKey::Name => "v.name",
            VendorSortKey::Contracts => "contract_count",
            VendorSortKey::Amount => "total_awarded",
        }
    }
}

impl FromStr for VendorSortKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "contracts" => VendorSortKey::Contracts,
            "amount" => VendorSortKey::Amount,
            _ => VendorSortKey::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_fall_back_to_defaults() {
        assert_eq!("amount; DROP TABLE contracts".parse::<ContractSortKey>(), Ok(ContractSortKey::Amount));
        assert_eq!("bogus".parse::<VendorSortKey>(), Ok(VendorSortKey::Name));
        assert_eq!("sideways".parse::<SortOrder>(), Ok(SortOrder::Desc));
    }

    #[test]
    fn known_keys_map_to_fixed_columns() {
        assert_eq!("vendor".parse::<ContractSortKey>().map(|k| k.column()), Ok("vendor_name"));
        assert_eq!("AMOUNT".parse::<VendorSortKey>().map(|k| k.column()), Ok("total_awarded"));
        assert_eq!("asc".parse::<SortOrder>().map(|o| o.as_sql()), Ok("ASC"));
        assert!(ContractSortKey::EndDate.column().contains("substr(end_date"));
    }
}
