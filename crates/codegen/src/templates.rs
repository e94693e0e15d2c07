//! Fixed support files and skeleton fragments. None of these contain
//! oracle output.

use crate::layout::CONFIG_FILE;

/// Godog module manifest. `go mod tidy` fills in the rest.
pub fn go_mod() -> String {
    r#"module stepsmith/generated

go 1.21

require github.com/cucumber/godog v0.14.1
"#
    .to_string()
}

/// Loads the test configuration into `scenarioContext.config`.
pub(crate) fn godog_config_loader() -> String {
    format!(
        r#"func loadConfig() map[string]interface{{}} {{
	cfg := map[string]interface{{}}{{}}
	data, err := os.ReadFile("{config}")
	if err != nil {{
		return cfg
	}}
	_ = json.Unmarshal(data, &cfg)
	return cfg
}}

func newScenarioContext() *scenarioContext {{
	return &scenarioContext{{config: loadConfig()}}
}}
"#,
        config = CONFIG_FILE,
    )
}

pub(crate) fn godog_test_suite() -> String {
    r#"func TestFeatures(t *testing.T) {
	suite := godog.TestSuite{
		ScenarioInitializer: InitializeScenario,
		Options: &godog.Options{
			Format:   "pretty",
			Paths:    []string{"features"},
			TestingT: t,
		},
	}
	if suite.Run() != 0 {
		t.Fatal("non-zero status returned, failed to run feature tests")
	}
}
"#
    .to_string()
}

/// Behave hooks: loads the configuration into `context.test_config`.
pub fn behave_environment() -> String {
    format!(
        r#"import json
import os


def before_all(context):
    config_path = os.path.join(os.path.dirname(__file__), "{config}")
    with open(config_path, "r", encoding="utf-8") as f:
        context.test_config = json.load(f)
"#,
        config = CONFIG_FILE,
    )
}

/// Static initializer filling `StepDefinitions.testConfig` from the
/// classpath.
pub(crate) fn cucumber_config_loader() -> String {
    format!(
        r#"    static {{
        try (InputStream in = StepDefinitions.class.getClassLoader().getResourceAsStream("{config}")) {{
            if (in == null) {{
                throw new RuntimeException("Config file not found: {config}");
            }}
            testConfig = new ObjectMapper().readTree(in);
        }} catch (java.io.IOException e) {{
            throw new RuntimeException("Failed to load test config", e);
        }}
    }}
"#,
        config = CONFIG_FILE,
    )
}

pub fn cucumber_runner() -> String {
    r#"package runner;

import org.junit.runner.RunWith;
import io.cucumber.junit.Cucumber;
import io.cucumber.junit.CucumberOptions;

@RunWith(Cucumber.class)
@CucumberOptions(
    features = "src/test/resources/features",
    glue = "stepdefinitions",
    plugin = {"json:target/cucumber-report.json", "pretty"}
)
public class TestRunner {
}
"#
    .to_string()
}

pub fn pom_xml() -> String {
    r#"<project xmlns="http://maven.apache.org/POM/4.0.0"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 http://maven.apache.org/xsd/maven-4.0.0.xsd">
    <modelVersion>4.0.0</modelVersion>
    <groupId>stepsmith.generated</groupId>
    <artifactId>cucumber-tests</artifactId>
    <version>1.0-SNAPSHOT</version>
    <packaging>jar</packaging>

    <properties>
        <maven.compiler.source>11</maven.compiler.source>
        <maven.compiler.target>11</maven.compiler.target>
        <project.build.sourceEncoding>UTF-8</project.build.sourceEncoding>
        <cucumber.version>7.18.1</cucumber.version>
        <junit.version>4.13.2</junit.version>
        <jackson.version>2.17.1</jackson.version>
    </properties>

    <dependencies>
        <dependency>
            <groupId>io.cucumber</groupId>
            <artifactId>cucumber-java</artifactId>
            <version>${cucumber.version}</version>
            <scope>test</scope>
        </dependency>
        <dependency>
            <groupId>io.cucumber</groupId>
            <artifactId>cucumber-junit</artifactId>
            <version>${cucumber.version}</version>
            <scope>test</scope>
        </dependency>
        <dependency>
            <groupId>junit</groupId>
            <artifactId>junit</artifactId>
            <version>${junit.version}</version>
            <scope>test</scope>
        </dependency>
        <dependency>
            <groupId>com.fasterxml.jackson.core</groupId>
            <artifactId>jackson-databind</artifactId>
            <version>${jackson.version}</version>
        </dependency>
    </dependencies>
</project>
"#
    .to_string()
}
