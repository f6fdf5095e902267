//! Feed records as they appear in the chunk files. Every attribute arrives as
//! text; numbers, booleans and nulls are tolerated and rendered to strings.

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;

/// One employee from the corporate identity feed.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Employee {
    #[serde(default, deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "text")]
    pub employee_email_address: String,
    #[serde(default, deserialize_with = "text")]
    pub role: String,
    #[serde(default, deserialize_with = "text")]
    pub status: String,
    #[serde(default, deserialize_with = "text")]
    pub record_type: String,
    #[serde(default, deserialize_with = "text")]
    pub title: String,
    #[serde(default, deserialize_with = "text")]
    pub mgr: String,
    #[serde(default, deserialize_with = "text")]
    pub lob: String,
    #[serde(default, deserialize_with = "text")]
    pub cost_center: String,
    #[serde(default, deserialize_with = "text")]
    pub region: String,
    #[serde(default, deserialize_with = "text")]
    pub country: String,
    #[serde(default, deserialize_with = "text")]
    pub start_date: String,
    #[serde(default, deserialize_with = "text")]
    pub end_date: String,
    #[serde(default, deserialize_with = "text")]
    pub created_on: String,
    #[serde(default, deserialize_with = "text")]
    pub created_by: String,
    #[serde(default, deserialize_with = "text")]
    pub updated_on: String,
    #[serde(default, deserialize_with = "text")]
    pub updated_by: String,
    #[serde(default, deserialize_with = "text")]
    pub employee_full_name: String,
    #[serde(default, deserialize_with = "text")]
    pub ldap_status: String,
    #[serde(default, deserialize_with = "text")]
    pub evp: String,
    #[serde(default, deserialize_with = "text")]
    pub evp_direct: String,
    #[serde(default, deserialize_with = "text")]
    pub never_process_ldap: String,
    #[serde(default, deserialize_with = "text")]
    pub do_not_update_from_ldap: String,
    #[serde(default, deserialize_with = "text")]
    pub lock_region: String,
    #[serde(default, deserialize_with = "text")]
    pub left_company_on: String,
    #[serde(default, deserialize_with = "text")]
    pub inactive: String,
    #[serde(default, deserialize_with = "text")]
    pub mgr_level: String,
    #[serde(default, deserialize_with = "text")]
    pub state: String,
    #[serde(default, deserialize_with = "text")]
    pub city: String,
    #[serde(default, deserialize_with = "text")]
    pub mgr_chain: String,
    #[serde(default, deserialize_with = "text")]
    pub top_mgr_dir_minus_1: String,
    #[serde(default, deserialize_with = "text")]
    pub top_mgr_dir_minus_2: String,
    #[serde(default, deserialize_with = "text")]
    pub top_mgr_dir_minus_3: String,
    #[serde(default, deserialize_with = "text")]
    pub top_mgr_dir_minus_4: String,
    #[serde(default, deserialize_with = "text")]
    pub num_directs: String,
    #[serde(default, deserialize_with = "text")]
    pub num_users: String,
    #[serde(default, deserialize_with = "text")]
    pub olduid: String,
    #[serde(default, deserialize_with = "text")]
    pub chain_level: String,
    #[serde(default, deserialize_with = "text")]
    pub oracle_uid: String,
    #[serde(default, deserialize_with = "text")]
    pub lob_detail: String,
    #[serde(default, deserialize_with = "text")]
    pub hier_level: String,
    #[serde(default, deserialize_with = "text")]
    pub top_mgr_seq: String,
    #[serde(default, deserialize_with = "text")]
    pub lob_tag: String,
    #[serde(default, deserialize_with = "text")]
    pub lob_tag_parent: String,
}

/// One opportunity revenue line from the sales export.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OpportunityFeed {
    #[serde(default, deserialize_with = "text")]
    pub opportunity_id: String,
    #[serde(default, deserialize_with = "text")]
    pub opportunity_name: String,
    #[serde(default, deserialize_with = "text")]
    pub opportunity_owner: String,
    #[serde(default, deserialize_with = "text")]
    pub territory_owner: String,
    #[serde(default, deserialize_with = "text")]
    pub opportunity_status: String,
    #[serde(default, deserialize_with = "text")]
    pub close_date: String,
    #[serde(default, deserialize_with = "text")]
    pub customer_name: String,
    #[serde(default, deserialize_with = "text")]
    pub opp_probability: String,
    #[serde(default, deserialize_with = "text")]
    pub opty_int_id: String,
    #[serde(default, deserialize_with = "text")]
    pub registry_id: String,
    #[serde(default, deserialize_with = "text")]
    pub cim_id: String,
    #[serde(default, deserialize_with = "text")]
    pub oppty_amount_k: String,
    #[serde(default, deserialize_with = "text")]
    pub forecast_type_group: String,
    #[serde(default, deserialize_with = "text")]
    pub revenue_line_id: String,
    #[serde(default, deserialize_with = "text")]
    pub revenue_type: String,
    #[serde(default, deserialize_with = "text")]
    pub revenue_type_group: String,
    #[serde(default, deserialize_with = "text")]
    pub revenue_line_status: String,
    #[serde(default, deserialize_with = "text")]
    pub rev_sales_stage: String,
    #[serde(default, deserialize_with = "text")]
    pub rev_pipeline_k: String,
    #[serde(default, deserialize_with = "text")]
    pub rev_tcv_k: String,
    #[serde(default, deserialize_with = "text")]
    pub rev_probability: String,
    #[serde(default, deserialize_with = "text")]
    pub product_class: String,
    #[serde(default, deserialize_with = "text")]
    pub product_pillar: String,
    #[serde(default, deserialize_with = "text")]
    pub product_line: String,
    #[serde(default, deserialize_with = "text")]
    pub product_group: String,
    #[serde(default, deserialize_with = "text")]
    pub product_name: String,
    #[serde(default, deserialize_with = "text")]
    pub product_description: String,
    #[serde(default, deserialize_with = "text")]
    pub opp_total_workload_k: String,
    #[serde(default, deserialize_with = "text")]
    pub consumption_start_date: String,
    #[serde(default, deserialize_with = "text")]
    pub cons_ramp_months: String,
    #[serde(default, deserialize_with = "text")]
    pub level_2_territory_name: String,
    #[serde(default, deserialize_with = "text")]
    pub level_3_territory_name: String,
    #[serde(default, deserialize_with = "text")]
    pub level_2_territory_owner_email: String,
    #[serde(default, deserialize_with = "text")]
    pub level_3_territory_owner_email: String,
}

/// One account from the corporate account feed.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AccountFeed {
    #[serde(default, deserialize_with = "text")]
    pub cim_id: String,
    #[serde(default, deserialize_with = "text")]
    pub cim_id_parent: String,
    #[serde(default, deserialize_with = "text")]
    pub cim_id_reg: String,
    #[serde(default, deserialize_with = "text")]
    pub account_name: String,
    #[serde(rename = "bus_segment_str", default, deserialize_with = "text")]
    pub business_segment: String,
    #[serde(default, deserialize_with = "text")]
    pub end_user_registry_id: String,
    #[serde(rename = "end_user_orcl_glb_ult_reg_id", default, deserialize_with = "text")]
    pub global_registry_id: String,
    #[serde(rename = "end_user_registry_id_str", default, deserialize_with = "text")]
    pub registry_id_list: String,
    #[serde(rename = "nac_SE_Team", default, deserialize_with = "text")]
    pub nac_se_team: String,
    #[serde(rename = "nat_SE_Team", default, deserialize_with = "text")]
    pub nat_se_team: String,
}

/// Opportunity staging row after normalization. Amounts are in whole units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpportunityRow {
    pub opportunity_id: String,
    pub summary: String,
    pub sales_rep: String,
    pub projected_arr: f64,
    pub anticipated_close_date: String,
    pub win_probability: i64,
    pub projected_tcv: f64,
    pub integration_id: String,
    pub registry_id: String,
    pub cim_id: String,
    pub status: String,
    pub customer_name: String,
    pub territory_owner: String,
    pub opportunity_value: f64,
    pub forecast_type_group: String,
    pub revenue_line_id: String,
    pub revenue_type: String,
    pub revenue_type_group: String,
    pub revenue_line_status: String,
    pub revenue_sales_stage: String,
    pub revenue_pipeline: f64,
    pub revenue_tcv: f64,
    pub revenue_probability: i64,
    pub product_class: String,
    pub product_pillar: String,
    pub product_line: String,
    pub product_group: String,
    pub product_name: String,
    pub product_description: String,
    pub workload_amount: f64,
    pub consumption_start_date: String,
    pub consumption_ramp_months: f64,
    pub l2_territory_name: String,
    pub l3_territory_name: String,
    pub l2_territory_email: String,
    pub l3_territory_email: String,
}

impl OpportunityRow {
    /// Only open and won opportunities are copied into the lookup table.
    pub fn is_stageable(&self) -> bool {
        self.status == "Open" || self.status == "Won"
    }
}

/// Account staging row after normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountRow {
    pub cim_id: String,
    pub cim_id_parent: String,
    pub cim_id_reg: String,
    pub account_name: String,
    pub business_segment: String,
    pub end_user_registry_id: String,
    pub global_registry_id: String,
    pub registry_id_list: String,
    pub nac_se_team: String,
    pub nat_se_team: String,
}

fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct TextVisitor;

    impl<'de> Visitor<'de> for TextVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string, number, boolean or null")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_owned())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(TextVisitor)
}
