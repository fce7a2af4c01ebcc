use alertreach::api::{ApiError, ZabbixConnector};
use alertreach::config::ZabbixConfig;
use alertreach::core::{Connector, MonitoringApi, SendTo};
use alertreach::internal_metrics::Metrics;
use alertreach::resolver::{RecipientResolver, ResolveError};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": 1
    }))
}

fn zabbix_config(server: &MockServer, api_token: Option<&str>) -> ZabbixConfig {
    ZabbixConfig {
        url: server.uri(),
        username: "Admin".into(),
        password: "zabbix".into(),
        api_token: api_token.map(str::to_string),
        timeout_ms: 2_000,
        validate_certs: false,
    }
}

async fn mount(server: &MockServer, matcher: Value, result: Value) {
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .and(body_partial_json(matcher))
        .respond_with(rpc_result(result))
        .mount(server)
        .await;
}

/// Answers every call the resolver makes for host "Server-1" with trigger
/// "CPU high", action "Notify admins" and group "Admins" holding alice.
async fn mount_server_1(server: &MockServer) {
    mount(
        server,
        json!({ "method": "host.get" }),
        json!([{ "hostid": "10084", "name": "Server-1", "hostgroups": [{ "groupid": "2" }] }]),
    )
    .await;
    mount(
        server,
        json!({ "method": "trigger.get", "params": { "hostids": ["10084"] } }),
        json!([{
            "triggerid": "100",
            "description": "CPU high",
            "event_name": "",
            "priority": "4",
            "templateid": "42",
            "tags": [{ "tag": "scope", "value": "performance" }],
            "hosts": [{ "hostid": "10084" }],
            "hostgroups": [{ "groupid": "2" }],
            "discoveryRule": []
        }]),
    )
    .await;
    mount(
        server,
        json!({ "method": "template.get", "params": { "triggerids": ["42"] } }),
        json!([{ "templateid": "10001", "triggers": [{ "triggerid": "42" }], "discoveries": [] }]),
    )
    .await;
    mount(
        server,
        json!({ "method": "action.get" }),
        json!([{
            "actionid": "7",
            "name": "Notify admins",
            "esc_period": "1h",
            "eval_formula": "A and B",
            "filter": {
                "evaltype": "0",
                "eval_formula": "A and B",
                "conditions": [
                    { "conditiontype": "13", "operator": "0", "value": "10001", "value2": "", "formulaid": "A" },
                    { "conditiontype": "25", "operator": "0", "value": "scope", "value2": "", "formulaid": "B" }
                ]
            },
            "operations": [{
                "operationid": "31",
                "operationtype": "0",
                "esc_period": "0",
                "esc_step_from": "2",
                "esc_step_to": "0",
                "opmessage": { "default_msg": "1", "subject": "", "message": "", "mediatypeid": "1" },
                "opmessage_usr": [],
                "opmessage_grp": [{ "usrgrpid": "7" }]
            }],
            "recovery_operations": [{
                "operationid": "32",
                "operationtype": "11",
                "opmessage": { "default_msg": "1", "subject": "", "message": "", "mediatypeid": "0" }
            }],
            "update_operations": []
        }]),
    )
    .await;
    mount(
        server,
        json!({ "method": "mediatype.get" }),
        json!([{
            "mediatypeid": "1",
            "name": "Email",
            "message_templates": [
                { "eventsource": "0", "recovery": "0", "subject": "Problem: {EVENT.NAME}", "message": "Started" },
                { "eventsource": "0", "recovery": "1", "subject": "Resolved: {EVENT.NAME}", "message": "Resolved" }
            ]
        }]),
    )
    .await;
    mount(
        server,
        json!({ "method": "usergroup.get" }),
        json!([{
            "usrgrpid": "7",
            "users": [{ "userid": "5" }],
            "hostgroup_rights": [{ "id": "2", "permission": "2" }]
        }]),
    )
    .await;
    mount(
        server,
        json!({ "method": "user.get", "params": { "selectMedias": ["mediatypeid", "active", "sendto"] } }),
        json!([{
            "userid": "5",
            "username": "alice",
            "medias": [
                { "mediatypeid": "1", "active": "0", "sendto": ["alice@example.com"] },
                { "mediatypeid": "3", "active": "1", "sendto": "+15550100" }
            ]
        }]),
    )
    .await;
    mount(
        server,
        json!({ "method": "user.get" }),
        json!([{
            "userid": "5",
            "username": "alice",
            "name": "Alice",
            "surname": "Liddell",
            "role": { "roleid": "1", "type": "1" },
            "usrgrps": [{ "usrgrpid": "7" }]
        }]),
    )
    .await;
}

#[tokio::test]
async fn test_resolves_report_over_json_rpc() {
    let server = MockServer::start().await;
    mount_server_1(&server).await;

    let connector = ZabbixConnector::new(zabbix_config(&server, Some("token")), Metrics::new()).unwrap();
    let api = connector.connect().await.unwrap();
    let host = RecipientResolver::new(Metrics::new())
        .resolve(api.as_ref(), "10084")
        .await
        .unwrap();

    let trigger = &host.triggers["100"];
    assert_eq!(trigger.templates, vec!["10001".to_string()]);
    assert_eq!(trigger.messages.len(), 2);

    let problem = &trigger.messages[0];
    assert_eq!(problem.subject, "Problem: {EVENT.NAME}");
    assert_eq!(problem.esc_step_from, 2);
    assert_eq!(problem.start_delay, "1h");
    assert_eq!(problem.repeat_count, "∞");

    let alice = &problem.recipients[0];
    assert_eq!(alice.fullname.as_deref(), Some("Alice Liddell"));
    assert_eq!(
        alice.send_to("1"),
        Some(&SendTo::Multiple(vec!["alice@example.com".to_string()]))
    );
    assert_eq!(alice.send_to("3"), None);
    assert!(alice.has_right);
    assert!(alice.is_eligible_for("1"));

    // "Notify all involved" on recovery reaches the problem step's recipients.
    let recovery = &trigger.messages[1];
    assert_eq!(recovery.subject, "Resolved: {EVENT.NAME}");
    assert_eq!(recovery.repeat_count, "1");
    assert_eq!(recovery.recipients[0].username, "alice");
}

#[tokio::test]
async fn test_token_session_skips_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "user.login" })))
        .respond_with(rpc_result(json!("unused")))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("Authorization", "Bearer token"))
        .and(body_partial_json(json!({ "method": "host.get" })))
        .respond_with(rpc_result(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let connector = ZabbixConnector::new(zabbix_config(&server, Some("token")), Metrics::new()).unwrap();
    let api = connector.connect().await.unwrap();
    assert!(api.get_hosts().await.unwrap().is_empty());
    api.logout().await.unwrap();
}

#[tokio::test]
async fn test_missing_host_over_json_rpc() {
    let server = MockServer::start().await;
    mount(&server, json!({ "method": "user.login" }), json!("session")).await;
    mount(&server, json!({ "method": "host.get" }), json!([])).await;

    let connector = ZabbixConnector::new(zabbix_config(&server, None), Metrics::new()).unwrap();
    let api = connector.connect().await.unwrap();
    let result = RecipientResolver::new(Metrics::new())
        .resolve(api.as_ref(), "999")
        .await;
    assert!(matches!(result, Err(ResolveError::Lookup(_))));
}

#[tokio::test]
async fn test_unreachable_server_is_upstream_error() {
    let server = MockServer::start().await;
    let config = zabbix_config(&server, None);
    drop(server);

    let connector = ZabbixConnector::new(config, Metrics::new()).unwrap();
    let result = connector.connect().await;
    assert!(matches!(result, Err(ApiError::Transport(_))));
}
