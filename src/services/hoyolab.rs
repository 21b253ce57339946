// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HoYoLAB / HoYoverse API client.
//!
//! Handles:
//! - Cookie session verification
//! - Listing Genshin Impact game roles bound to the account
//! - Daily sign-in (info, reward calendar, sign)
//! - Redeem code (cdkey) exchange
//!
//! Authentication is entirely cookie based; callers pass the cookie header
//! built from the user's stored credentials on every call.

use crate::config::HoyolabEndpoints;
use crate::error::AppError;
use reqwest::header::{COOKIE, ORIGIN, REFERER};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// `game_biz` of Genshin Impact global accounts.
pub const GENSHIN_GLOBAL_BIZ: &str = "hk4e_global";

const ACT_ORIGIN: &str = "https://act.hoyolab.com/";
const WEBSTATIC_REFERER: &str = "https://webstatic-sea.hoyoverse.com/";
const WEBSTATIC_ORIGIN: &str = "https://webstatic-sea.hoyoverse.com";

/// HoYoLAB API client.
#[derive(Clone)]
pub struct HoyolabClient {
    http: reqwest::Client,
    endpoints: HoyolabEndpoints,
}

impl HoyolabClient {
    /// Create a client that sends `user_agent` on every request.
    pub fn new(endpoints: HoyolabEndpoints, user_agent: &str) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client error: {}", e)))?;

        Ok(Self { http, endpoints })
    }

    /// Check whether the cookie still represents a logged-in HoYoLAB session.
    pub async fn verify_cookie(&self, cookie: &str) -> Result<bool, AppError> {
        let url = format!(
            "{}/auth/api/getUserAccountInfoByLToken",
            self.endpoints.account_api
        );
        let envelope: ApiEnvelope<serde_json::Value> = self.get_json(&url, cookie, &[]).await?;

        if envelope.retcode != 0 {
            tracing::info!(
                retcode = envelope.retcode,
                message = %envelope.message,
                "HoYoLAB cookie rejected"
            );
        }
        Ok(envelope.retcode == 0)
    }

    /// List the Genshin Impact (global) roles bound to the account.
    pub async fn get_game_accounts(&self, cookie: &str) -> Result<Vec<GameAccount>, AppError> {
        let url = format!(
            "{}/binding/api/getUserGameRolesByCookie",
            self.endpoints.takumi_api
        );
        let envelope: ApiEnvelope<GameRoleList> = self.get_json(&url, cookie, &[]).await?;

        Ok(envelope
            .data
            .map(|d| d.list)
            .unwrap_or_default()
            .into_iter()
            .filter(|account| account.game_biz == GENSHIN_GLOBAL_BIZ)
            .collect())
    }

    /// Claim today's sign-in reward for `account` if not claimed yet.
    ///
    /// Failures to read the sign-in state or the reward calendar are
    /// reported as outcomes, not errors. Only a failed sign request is an
    /// `Err`.
    pub async fn check_in(
        &self,
        cookie: &str,
        act_id: &str,
        account: &GameAccount,
    ) -> Result<CheckInOutcome, AppError> {
        let nickname = account.nickname.clone();
        let query = [("act_id", act_id)];

        let info_url = format!("{}/event/sol/info", self.endpoints.sol_api);
        let info = match self
            .get_json::<ApiEnvelope<SignInfo>>(&info_url, cookie, &query)
            .await
        {
            Ok(envelope) => envelope.data,
            Err(e) => {
                tracing::warn!(error = %e, nickname = %nickname, "Failed to fetch sign-in info");
                None
            }
        };
        let Some(info) = info else {
            return Ok(CheckInOutcome::InfoUnavailable { nickname });
        };

        let home_url = format!("{}/event/sol/home", self.endpoints.sol_api);
        let awards = match self
            .get_json::<ApiEnvelope<SignHome>>(&home_url, cookie, &query)
            .await
        {
            Ok(envelope) => envelope.data.and_then(|d| d.awards),
            Err(e) => {
                tracing::warn!(error = %e, nickname = %nickname, "Failed to fetch sign-in rewards");
                None
            }
        };
        let Some(awards) = awards else {
            return Ok(CheckInOutcome::RewardsUnavailable { nickname });
        };

        if info.is_sign {
            return Ok(CheckInOutcome::AlreadySigned { nickname });
        }

        let sign_url = format!("{}/event/sol/sign", self.endpoints.sol_api);
        let sign_error =
            |e: String| AppError::Hoyolab(format!("Error checking in for {}: {}", nickname, e));

        let response = self
            .http
            .post(&sign_url)
            .query(&query)
            .header(COOKIE, cookie)
            .header(REFERER, ACT_ORIGIN)
            .header(ORIGIN, ACT_ORIGIN)
            .send()
            .await
            .map_err(|e| sign_error(e.to_string()))?;

        let signed: ApiEnvelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| sign_error(format!("JSON parse error: {}", e)))?;

        if signed.retcode != 0 {
            return Ok(CheckInOutcome::Rejected {
                message: signed.message,
            });
        }

        // Today's reward sits at the index of days already signed.
        let reward = usize::try_from(info.total_sign_day)
            .ok()
            .and_then(|day| awards.get(day).cloned());

        Ok(CheckInOutcome::Signed { nickname, reward })
    }

    /// Exchange a redeem code for the UID in `request`.
    ///
    /// Any JSON answer (whatever the HTTP status) is returned so the caller
    /// can record HoYoverse's message.
    pub async fn redeem_code(
        &self,
        cookie: &str,
        request: &RedeemRequest,
    ) -> Result<RedeemResponse, AppError> {
        let url = format!(
            "{}/common/apicdkey/api/webExchangeCdkey",
            self.endpoints.cdkey_api
        );

        let response = self
            .http
            .get(&url)
            .query(&[
                ("uid", request.uid.as_str()),
                ("region", request.region.as_str()),
                ("lang", request.lang.as_str()),
                ("cdkey", request.cdkey.as_str()),
                ("game_biz", request.game_biz.as_str()),
                ("sLangKey", request.s_lang_key.as_str()),
            ])
            .header(COOKIE, cookie)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(REFERER, WEBSTATIC_REFERER)
            .header(ORIGIN, WEBSTATIC_ORIGIN)
            .header("DNT", "1")
            .send()
            .await
            .map_err(|e| AppError::Hoyolab(format!("Redeem request failed: {}", e)))?;

        if response.status().as_u16() == 429 {
            tracing::warn!("HoYoverse rate limit hit (429)");
            return Err(AppError::Hoyolab(AppError::HOYOLAB_RATE_LIMIT.to_string()));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Hoyolab(format!("JSON parse error: {}", e)))
    }

    /// GET with the HoYoLAB activity headers and a JSON response.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cookie: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .header(COOKIE, cookie)
            .header(REFERER, ACT_ORIGIN)
            .header(ORIGIN, ACT_ORIGIN)
            .send()
            .await
            .map_err(|e| AppError::Hoyolab(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("HoYoLAB rate limit hit (429)");
                return Err(AppError::Hoyolab(AppError::HOYOLAB_RATE_LIMIT.to_string()));
            }

            return Err(AppError::Hoyolab(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Hoyolab(format!("JSON parse error: {}", e)))
    }
}

/// Common HoYoLAB response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub retcode: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
struct GameRoleList {
    #[serde(default)]
    list: Vec<GameAccount>,
}

/// A game role bound to the HoYoLAB account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GameAccount {
    pub game_biz: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub game_uid: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub nickname: String,
}

/// Sign-in state for the current month.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInfo {
    #[serde(default)]
    pub is_sign: bool,
    #[serde(default)]
    pub total_sign_day: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct SignHome {
    awards: Option<Vec<Reward>>,
}

/// One day of the sign-in reward calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Reward {
    pub name: String,
    pub cnt: u32,
    #[serde(default)]
    pub icon: String,
}

/// Result of a check-in attempt for one game account.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckInOutcome {
    Signed {
        nickname: String,
        reward: Option<Reward>,
    },
    AlreadySigned {
        nickname: String,
    },
    InfoUnavailable {
        nickname: String,
    },
    RewardsUnavailable {
        nickname: String,
    },
    Rejected {
        message: String,
    },
}

impl CheckInOutcome {
    /// Whether the account ends the day checked in.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            CheckInOutcome::Signed { .. } | CheckInOutcome::AlreadySigned { .. }
        )
    }

    /// Human readable log line.
    pub fn message(&self) -> String {
        match self {
            CheckInOutcome::Signed {
                nickname,
                reward: Some(reward),
            } => format!(
                "Check-in successful for {}: {} x {}",
                nickname, reward.name, reward.cnt
            ),
            CheckInOutcome::Signed {
                nickname,
                reward: None,
            } => format!("Check-in successful for {}", nickname),
            CheckInOutcome::AlreadySigned { nickname } => {
                format!("Already checked in for {}", nickname)
            }
            CheckInOutcome::InfoUnavailable { nickname } => {
                format!("Failed to fetch check-in info for {}", nickname)
            }
            CheckInOutcome::RewardsUnavailable { nickname } => {
                format!("Failed to fetch check-in rewards for {}", nickname)
            }
            CheckInOutcome::Rejected { message } => format!("Failed to check in: {}", message),
        }
    }
}

/// Parameters of a cdkey exchange.
#[derive(Debug, Clone)]
pub struct RedeemRequest {
    pub uid: String,
    pub region: String,
    pub lang: String,
    pub cdkey: String,
    pub game_biz: String,
    pub s_lang_key: String,
}

/// cdkey exchange answer.
#[derive(Debug, Clone, Deserialize)]
pub struct RedeemResponse {
    pub retcode: i64,
    #[serde(default)]
    pub message: String,
}

impl RedeemResponse {
    pub fn is_success(&self) -> bool {
        self.retcode == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const COOKIE_HEADER: &str = "ltoken_v2=abc; ltuid_v2=42";
    const ACT_ID: &str = "e202102251931481";

    fn client_for(server: &mockito::ServerGuard) -> HoyolabClient {
        HoyolabClient::new(HoyolabEndpoints::all(&server.url()), "test-agent").unwrap()
    }

    fn traveler() -> GameAccount {
        GameAccount {
            game_biz: GENSHIN_GLOBAL_BIZ.to_string(),
            region: "os_asia".to_string(),
            game_uid: "800000001".to_string(),
            level: 60,
            nickname: "Lumine".to_string(),
        }
    }

    async fn mock_sol(
        server: &mut mockito::ServerGuard,
        method: &str,
        path: &str,
        body: &str,
    ) -> mockito::Mock {
        server
            .mock(method, path)
            .match_query(Matcher::UrlEncoded("act_id".into(), ACT_ID.into()))
            .match_header("cookie", COOKIE_HEADER)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    const AWARDS: &str = r#"{"retcode":0,"message":"OK","data":{"awards":[
        {"name":"Primogem","cnt":20,"icon":"p.png"},
        {"name":"Mora","cnt":5000,"icon":"m.png"}]}}"#;

    #[tokio::test]
    async fn test_verify_cookie_retcode_zero_is_valid() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/auth/api/getUserAccountInfoByLToken")
            .match_header("cookie", COOKIE_HEADER)
            .match_header("user-agent", "test-agent")
            .match_header("referer", ACT_ORIGIN)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"retcode":0,"message":"OK","data":{"account_id":42}}"#)
            .create_async()
            .await;

        assert!(client_for(&server).verify_cookie(COOKIE_HEADER).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_cookie_nonzero_retcode_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/auth/api/getUserAccountInfoByLToken")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"retcode":-100,"message":"Please login","data":null}"#)
            .create_async()
            .await;

        assert!(!client_for(&server).verify_cookie(COOKIE_HEADER).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_cookie_http_error_is_err() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/auth/api/getUserAccountInfoByLToken")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = client_for(&server)
            .verify_cookie(COOKIE_HEADER)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Hoyolab(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_is_detected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/auth/api/getUserAccountInfoByLToken")
            .with_status(429)
            .create_async()
            .await;

        let err = client_for(&server)
            .verify_cookie(COOKIE_HEADER)
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_get_game_accounts_keeps_genshin_global_only() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/binding/api/getUserGameRolesByCookie")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"retcode":0,"message":"OK","data":{"list":[
                    {"game_biz":"hk4e_global","region":"os_asia","game_uid":"800000001","level":60,"nickname":"Lumine"},
                    {"game_biz":"hkrpg_global","region":"prod_official_asia","game_uid":"900000001","level":70,"nickname":"Stelle"}
                ]}}"#,
            )
            .create_async()
            .await;

        let accounts = client_for(&server)
            .get_game_accounts(COOKIE_HEADER)
            .await
            .unwrap();

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].nickname, "Lumine");
        assert_eq!(accounts[0].game_uid, "800000001");
    }

    #[tokio::test]
    async fn test_get_game_accounts_missing_data_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/binding/api/getUserGameRolesByCookie")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"retcode":-100,"message":"Please login","data":null}"#)
            .create_async()
            .await;

        let accounts = client_for(&server)
            .get_game_accounts(COOKIE_HEADER)
            .await
            .unwrap();
        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn test_check_in_signs_and_reports_todays_reward() {
        let mut server = mockito::Server::new_async().await;
        let _info = mock_sol(
            &mut server,
            "GET",
            "/event/sol/info",
            r#"{"retcode":0,"message":"OK","data":{"is_sign":false,"total_sign_day":1}}"#,
        )
        .await;
        let _home = mock_sol(&mut server, "GET", "/event/sol/home", AWARDS).await;
        let sign = mock_sol(
            &mut server,
            "POST",
            "/event/sol/sign",
            r#"{"retcode":0,"message":"OK","data":{"code":"ok"}}"#,
        )
        .await;

        let outcome = client_for(&server)
            .check_in(COOKIE_HEADER, ACT_ID, &traveler())
            .await
            .unwrap();

        sign.assert_async().await;
        assert!(outcome.is_success());
        assert_eq!(outcome.message(), "Check-in successful for Lumine: Mora x 5000");
    }

    #[tokio::test]
    async fn test_check_in_already_signed_does_not_post() {
        let mut server = mockito::Server::new_async().await;
        let _info = mock_sol(
            &mut server,
            "GET",
            "/event/sol/info",
            r#"{"retcode":0,"message":"OK","data":{"is_sign":true,"total_sign_day":5}}"#,
        )
        .await;
        let _home = mock_sol(&mut server, "GET", "/event/sol/home", AWARDS).await;
        let sign = server
            .mock("POST", "/event/sol/sign")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let outcome = client_for(&server)
            .check_in(COOKIE_HEADER, ACT_ID, &traveler())
            .await
            .unwrap();

        sign.assert_async().await;
        assert_eq!(
            outcome,
            CheckInOutcome::AlreadySigned {
                nickname: "Lumine".to_string()
            }
        );
        assert_eq!(outcome.message(), "Already checked in for Lumine");
    }

    #[tokio::test]
    async fn test_check_in_info_failure_is_outcome() {
        let mut server = mockito::Server::new_async().await;
        let _info = server
            .mock("GET", "/event/sol/info")
            .match_query(Matcher::Any)
            .with_status(502)
            .create_async()
            .await;

        let outcome = client_for(&server)
            .check_in(COOKIE_HEADER, ACT_ID, &traveler())
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert_eq!(outcome.message(), "Failed to fetch check-in info for Lumine");
    }

    #[tokio::test]
    async fn test_check_in_missing_awards_is_outcome() {
        let mut server = mockito::Server::new_async().await;
        let _info = mock_sol(
            &mut server,
            "GET",
            "/event/sol/info",
            r#"{"retcode":0,"message":"OK","data":{"is_sign":false,"total_sign_day":0}}"#,
        )
        .await;
        let _home = mock_sol(
            &mut server,
            "GET",
            "/event/sol/home",
            r#"{"retcode":0,"message":"OK","data":{}}"#,
        )
        .await;

        let outcome = client_for(&server)
            .check_in(COOKIE_HEADER, ACT_ID, &traveler())
            .await
            .unwrap();

        assert_eq!(
            outcome.message(),
            "Failed to fetch check-in rewards for Lumine"
        );
    }

    #[tokio::test]
    async fn test_check_in_rejected_sign_reports_message() {
        let mut server = mockito::Server::new_async().await;
        let _info = mock_sol(
            &mut server,
            "GET",
            "/event/sol/info",
            r#"{"retcode":0,"message":"OK","data":{"is_sign":false,"total_sign_day":0}}"#,
        )
        .await;
        let _home = mock_sol(&mut server, "GET", "/event/sol/home", AWARDS).await;
        let _sign = mock_sol(
            &mut server,
            "POST",
            "/event/sol/sign",
            r#"{"retcode":-5003,"message":"Traveler, you've already checked in today~","data":null}"#,
        )
        .await;

        let outcome = client_for(&server)
            .check_in(COOKIE_HEADER, ACT_ID, &traveler())
            .await
            .unwrap();

        assert_eq!(
            outcome.message(),
            "Failed to check in: Traveler, you've already checked in today~"
        );
    }

    #[tokio::test]
    async fn test_check_in_reward_index_out_of_range() {
        let mut server = mockito::Server::new_async().await;
        let _info = mock_sol(
            &mut server,
            "GET",
            "/event/sol/info",
            r#"{"retcode":0,"message":"OK","data":{"is_sign":false,"total_sign_day":7}}"#,
        )
        .await;
        let _home = mock_sol(&mut server, "GET", "/event/sol/home", AWARDS).await;
        let _sign = mock_sol(
            &mut server,
            "POST",
            "/event/sol/sign",
            r#"{"retcode":0,"message":"OK"}"#,
        )
        .await;

        let outcome = client_for(&server)
            .check_in(COOKIE_HEADER, ACT_ID, &traveler())
            .await
            .unwrap();

        assert_eq!(outcome.message(), "Check-in successful for Lumine");
    }

    #[tokio::test]
    async fn test_check_in_unparseable_sign_is_err() {
        let mut server = mockito::Server::new_async().await;
        let _info = mock_sol(
            &mut server,
            "GET",
            "/event/sol/info",
            r#"{"retcode":0,"message":"OK","data":{"is_sign":false,"total_sign_day":0}}"#,
        )
        .await;
        let _home = mock_sol(&mut server, "GET", "/event/sol/home", AWARDS).await;
        let _sign = mock_sol(&mut server, "POST", "/event/sol/sign", "<html>").await;

        let err = client_for(&server)
            .check_in(COOKIE_HEADER, ACT_ID, &traveler())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Error checking in for Lumine"));
    }

    #[tokio::test]
    async fn test_redeem_code_sends_query_and_returns_answer() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/common/apicdkey/api/webExchangeCdkey")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("uid".into(), "800000001".into()),
                Matcher::UrlEncoded("region".into(), "os_asia".into()),
                Matcher::UrlEncoded("lang".into(), "en".into()),
                Matcher::UrlEncoded("cdkey".into(), "GENSHINGIFT".into()),
                Matcher::UrlEncoded("game_biz".into(), "hk4e_global".into()),
                Matcher::UrlEncoded("sLangKey".into(), "en-us".into()),
            ]))
            .match_header("cookie", "cookie_token_v2=ct")
            .match_header("referer", WEBSTATIC_REFERER)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"retcode":-2017,"message":"Redemption code has been used","data":null}"#)
            .create_async()
            .await;

        let request = RedeemRequest {
            uid: "800000001".to_string(),
            region: "os_asia".to_string(),
            lang: "en".to_string(),
            cdkey: "GENSHINGIFT".to_string(),
            game_biz: "hk4e_global".to_string(),
            s_lang_key: "en-us".to_string(),
        };

        let answer = client_for(&server)
            .redeem_code("cookie_token_v2=ct", &request)
            .await
            .unwrap();

        assert!(!answer.is_success());
        assert_eq!(answer.message, "Redemption code has been used");
    }
}
